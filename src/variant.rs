use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::contents::{Element, FileContents};
use crate::edit::Point;
use crate::program::Program;

/// Working copy of the files a patch touches.
///
/// Edits address elements through the point indices assigned at parse time,
/// while insertions and deletions shift the underlying elements. Each file
/// therefore carries a position table mapping every original point to its
/// current element index, `None` once the element has been deleted. An edit
/// whose point is gone or out of range is skipped rather than applied
/// somewhere else.
#[derive(Debug)]
pub struct VariantContents {
    files: BTreeMap<PathBuf, FileVariant>,
}

#[derive(Debug)]
struct FileVariant {
    contents: FileContents,
    positions: Vec<Option<usize>>,
}

impl VariantContents {
    /// Start a variant from the pristine contents of the given files. Files
    /// unknown to the program are ignored.
    pub fn checkout<'a, I>(program: &Program, files: I) -> Self
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut map = BTreeMap::new();
        for file in files {
            let Some(contents) = program.contents().get(file) else {
                continue;
            };
            let Some(points) = program.modification_points().get(file) else {
                continue;
            };
            map.insert(
                file.to_path_buf(),
                FileVariant {
                    contents: contents.clone(),
                    positions: points.iter().map(|p| Some(*p)).collect(),
                },
            );
        }
        Self { files: map }
    }

    /// Remove the element at `point`. Returns whether anything happened.
    pub(crate) fn delete(&mut self, point: &Point) -> bool {
        let Some(file) = self.files.get_mut(&point.file) else {
            return false;
        };
        let Some(position) = file.position(point.index) else {
            return false;
        };

        file.contents.remove(position);
        file.positions[point.index] = None;
        for slot in file.positions.iter_mut().flatten() {
            if *slot > position {
                *slot -= 1;
            }
        }
        true
    }

    /// Insert `element` in front of the element at `point`. Repeated
    /// insertions at the same point stack in application order.
    pub(crate) fn insert_before(&mut self, point: &Point, element: Element) -> bool {
        let Some(file) = self.files.get_mut(&point.file) else {
            return false;
        };
        let Some(position) = file.position(point.index) else {
            return false;
        };

        file.contents.insert(position, element);
        for slot in file.positions.iter_mut().flatten() {
            if *slot >= position {
                *slot += 1;
            }
        }
        true
    }

    /// Overwrite the element at `point` with `element`.
    pub(crate) fn replace(&mut self, point: &Point, element: Element) -> bool {
        let Some(file) = self.files.get_mut(&point.file) else {
            return false;
        };
        let Some(position) = file.position(point.index) else {
            return false;
        };

        file.contents.replace(position, element);
        true
    }

    /// Collapse into plain per-file contents.
    pub fn into_files(self) -> BTreeMap<PathBuf, FileContents> {
        self.files
            .into_iter()
            .map(|(path, file)| (path, file.contents))
            .collect()
    }
}

impl FileVariant {
    fn position(&self, point_index: usize) -> Option<usize> {
        self.positions.get(point_index).copied().flatten()
    }
}
