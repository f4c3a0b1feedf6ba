use karst_mesh::FaceData;

/// Upper bound for the Manhattan-distance buckets; distances clamp here so a
/// player far outside the chunk still sorts.
const MAX_BUCKET: usize = 192;

#[inline]
fn axis_coord(f: FaceData, axis: usize) -> i32 {
    match axis {
        0 => f.x(),
        1 => f.y(),
        _ => f.z(),
    }
}

/// Whether a transparent face sits on the chunk side facing away from the
/// viewer. Faces on the boundary plane itself (stored coordinate zero along
/// the normal axis) are never culled; seam faces live there.
fn should_be_culled(f: FaceData, player_cell: [i32; 3]) -> bool {
    let n = f.normal();
    let axis = n.axis();
    let c = axis_coord(f, axis);
    if c == 0 {
        return false;
    }
    let p = player_cell[axis];
    if n.is_positive() { p < c } else { p > c }
}

/// Re-sorts a transparent face list for one chunk: culled faces are dropped
/// from the drawn prefix, the rest bucket-sort by Manhattan distance to the
/// viewer in cells, farthest first, with back faces ahead of front faces at
/// equal distance. The output is the prefix to upload; identical inputs give
/// identical outputs, so re-sorting at an unchanged player cell is free to
/// skip.
pub fn sort_transparent(faces: &[FaceData], player_cell: [i32; 3]) -> Vec<FaceData> {
    let mut buckets: Vec<(Vec<FaceData>, Vec<FaceData>)> = Vec::new();
    buckets.resize_with(MAX_BUCKET + 1, Default::default);
    let mut kept = 0usize;

    for &f in faces {
        if should_be_culled(f, player_cell) {
            continue;
        }
        let d = (f.x() - player_cell[0]).abs()
            + (f.y() - player_cell[1]).abs()
            + (f.z() - player_cell[2]).abs();
        let d = (d as usize).min(MAX_BUCKET);
        if f.is_back_face() {
            buckets[d].0.push(f);
        } else {
            buckets[d].1.push(f);
        }
        kept += 1;
    }

    let mut out = Vec::with_capacity(kept);
    for (back, front) in buckets.iter().rev() {
        out.extend_from_slice(back);
        out.extend_from_slice(front);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use karst_mesh::Face;

    fn face_at(x: i32, y: i32, z: i32, normal: Face, back: bool) -> FaceData {
        FaceData::pack(x, y, z, back, normal, 0, 1, 0)
    }

    #[test]
    fn farthest_faces_come_first() {
        let faces = vec![
            face_at(5, 5, 5, Face::PosY, false),
            face_at(5, 5, 25, Face::PosY, false),
            face_at(5, 5, 15, Face::PosY, false),
        ];
        let sorted = sort_transparent(&faces, [5, 5, 5]);
        let zs: Vec<i32> = sorted.iter().map(|f| f.z()).collect();
        assert_eq!(zs, vec![25, 15, 5]);
    }

    #[test]
    fn back_faces_render_before_front_faces() {
        let faces = vec![
            face_at(8, 8, 8, Face::PosX, false),
            face_at(8, 8, 8, Face::NegX, true),
        ];
        let sorted = sort_transparent(&faces, [0, 8, 8]);
        assert!(sorted[0].is_back_face());
        assert!(!sorted[1].is_back_face());
    }

    #[test]
    fn away_facing_faces_are_culled_except_on_the_boundary() {
        // +X face deep in the chunk with the viewer on the -X side: culled.
        let culled = face_at(20, 8, 8, Face::PosX, false);
        // Same orientation on the boundary plane: kept.
        let boundary = face_at(0, 8, 8, Face::PosX, false);
        let sorted = sort_transparent(&[culled, boundary], [-3, 8, 8]);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].x(), 0);
    }

    #[test]
    fn sorting_is_idempotent_for_a_fixed_cell() {
        let faces: Vec<FaceData> = (0..100)
            .map(|i| face_at(i % 32, (i * 7) % 32, (i * 13) % 32, Face::PosY, i % 3 == 0))
            .collect();
        let once = sort_transparent(&faces, [3, 5, 7]);
        let twice = sort_transparent(&faces, [3, 5, 7]);
        assert_eq!(once, twice);
        // And sorting the sorted prefix again with the same cell keeps it
        // byte-identical.
        let again = sort_transparent(&once, [3, 5, 7]);
        assert_eq!(once, again);
    }
}
