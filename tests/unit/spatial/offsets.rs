//! Tests for offset distances and overlap fractions

#[cfg(test)]
mod tests {
    use representativity::spatial::offsets::{OffsetGrid, overlap_count};

    // Tests overlap counts shrink with every shifted axis
    // Verified by ignoring the second axis
    #[test]
    fn test_overlap_count() {
        assert_eq!(overlap_count(&[0, 0], &[10, 10]), 100);
        assert_eq!(overlap_count(&[1, 2], &[10, 10]), 72);
        assert_eq!(overlap_count(&[3, 0, 1], &[5, 6, 7]), 72);
        assert_eq!(overlap_count(&[12, 0], &[10, 10]), 0);
    }

    // Tests distance table of a planar grid
    // Verified by measuring from the grid corner
    #[test]
    fn test_grid_distances() {
        let grid = OffsetGrid::new(3, &[20, 20]);

        assert_eq!(grid.half_extent(), 3);
        assert_eq!(grid.distances().shape(), &[7, 7]);

        let centre = grid.distances().get([3, 3]).copied();
        assert_eq!(centre, Some(0.0));

        let edge = grid.distances().get([3, 6]).copied().unwrap_or(f64::NAN);
        assert!((edge - 3.0).abs() < 1e-12);

        let corner = grid.distances().get([0, 0]).copied().unwrap_or(f64::NAN);
        assert!((corner - 18.0_f64.sqrt()).abs() < 1e-12);
        assert!((grid.max_distance() - corner).abs() < 1e-12);
    }

    // Tests overlap fractions relative to the image volume
    // Verified by normalising by the grid size
    #[test]
    fn test_grid_overlap_fractions() {
        let grid = OffsetGrid::new(1, &[10, 10]);
        let fractions = grid.overlap_fractions();

        let centre = fractions.get([1, 1]).copied().unwrap_or(f64::NAN);
        let edge = fractions.get([0, 1]).copied().unwrap_or(f64::NAN);
        let corner = fractions.get([2, 0]).copied().unwrap_or(f64::NAN);

        assert!((centre - 1.0).abs() < 1e-12);
        assert!((edge - 0.9).abs() < 1e-12);
        assert!((corner - 0.81).abs() < 1e-12);
    }

    // Tests volumetric grids span every axis
    // Verified by building a planar grid for volumes
    #[test]
    fn test_volumetric_grid() {
        let grid = OffsetGrid::new(2, &[10, 12, 14]);

        assert_eq!(grid.distances().shape(), &[5, 5, 5]);
        assert!((grid.max_distance() - 12.0_f64.sqrt()).abs() < 1e-12);
    }
}
