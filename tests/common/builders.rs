//! Test data builders for creating test grids

/// A row-major foreground mask.
#[derive(Debug, Clone)]
pub struct Grid {
    pub width: usize,
    pub cells: Vec<bool>,
}

impl Grid {
    pub fn height(&self) -> usize {
        self.cells.len().div_ceil(self.width)
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        col < self.width && self.cells.get(row * self.width + col).copied().unwrap_or(false)
    }

    /// Samples as a source would read them: 255 for foreground, 0 otherwise.
    pub fn samples(&self) -> Vec<u8> {
        self.cells.iter().map(|&c| if c { 255 } else { 0 }).collect()
    }

    /// Samples as CSV text, one grid row per line.
    pub fn to_csv(&self) -> String {
        self.samples()
            .chunks(self.width)
            .map(|row| {
                row.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builder for creating test grids from ASCII rows (`#` is foreground).
pub struct GridBuilder {
    width: usize,
    cells: Vec<bool>,
}

impl GridBuilder {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            cells: Vec::new(),
        }
    }

    pub fn row(mut self, row: &str) -> Self {
        assert_eq!(row.len(), self.width, "row {:?} has the wrong width", row);
        self.cells.extend(row.chars().map(|c| c == '#'));
        self
    }

    /// Repeat `row` `count` times.
    pub fn rows(mut self, row: &str, count: usize) -> Self {
        for _ in 0..count {
            self = self.row(row);
        }
        self
    }

    pub fn build(self) -> Grid {
        Grid {
            width: self.width,
            cells: self.cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_builder() {
        let grid = GridBuilder::new(3).row("#.#").rows("...", 2).build();

        assert_eq!(grid.height(), 3);
        assert!(grid.get(0, 2));
        assert!(!grid.get(1, 0));
        assert_eq!(grid.to_csv(), "255,0,255\n0,0,0\n0,0,0");
    }
}
