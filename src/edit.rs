use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::program::Program;
use crate::select::SelectionMethod;
use crate::variant::VariantContents;

/// Draws made when looking for a destination distinct from the source.
const DISTINCT_POINT_ATTEMPTS: usize = 32;

/// One modification point: an index into a file's point table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub file: PathBuf,
    pub index: usize,
}

impl Point {
    pub fn new(file: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.index)
    }
}

/// Kind tag for an edit, used to filter flattened atomic lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insertion,
    Deletion,
    Replacement,
    Moving,
}

/// One source transformation, addressed in terms of modification points.
///
/// Insertion, Deletion, and Replacement are atomic. Moving is a composite:
/// it decomposes into the deletion of its source followed by an insertion
/// of the source element at its destination. Ingredient elements are always
/// read from the pristine program contents, never from the working variant,
/// which is what lets Moving re-insert an element it just deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Insert a copy of the ingredient element in front of the target.
    Insertion { target: Point, ingredient: Point },

    /// Remove the target element.
    Deletion { target: Point },

    /// Overwrite the target element with a copy of the ingredient element.
    Replacement { target: Point, ingredient: Point },

    /// Move the source element in front of the destination.
    Moving { source: Point, destination: Point },
}

impl Edit {
    /// Deletion at a randomly drawn target point.
    pub fn random_deletion(
        program: &Program,
        rng: &mut fastrand::Rng,
        target_file: Option<&Path>,
        method: SelectionMethod,
    ) -> Result<Self> {
        Ok(Edit::Deletion {
            target: program.random_target(rng, target_file, method)?,
        })
    }

    /// Insertion at a randomly drawn target point. The ingredient is drawn
    /// uniformly across the whole program; weights only steer the target.
    pub fn random_insertion(
        program: &Program,
        rng: &mut fastrand::Rng,
        target_file: Option<&Path>,
        method: SelectionMethod,
    ) -> Result<Self> {
        let target = program.random_target(rng, target_file, method)?;
        let ingredient = program.random_target(rng, None, SelectionMethod::Random)?;
        Ok(Edit::Insertion { target, ingredient })
    }

    /// Replacement at a randomly drawn target point, with a uniformly drawn
    /// ingredient.
    pub fn random_replacement(
        program: &Program,
        rng: &mut fastrand::Rng,
        target_file: Option<&Path>,
        method: SelectionMethod,
    ) -> Result<Self> {
        let target = program.random_target(rng, target_file, method)?;
        let ingredient = program.random_target(rng, None, SelectionMethod::Random)?;
        Ok(Edit::Replacement { target, ingredient })
    }

    /// Moving with a randomly drawn source and a destination guaranteed to
    /// differ from it. Fails when the program is too small to offer two
    /// distinct points.
    pub fn random_moving(
        program: &Program,
        rng: &mut fastrand::Rng,
        target_file: Option<&Path>,
        method: SelectionMethod,
    ) -> Result<Self> {
        let source = program.random_target(rng, target_file, method)?;
        for _ in 0..DISTINCT_POINT_ATTEMPTS {
            let destination = program.random_target(rng, None, SelectionMethod::Random)?;
            if destination != source {
                return Ok(Edit::Moving {
                    source,
                    destination,
                });
            }
        }
        Err(Error::Validation(format!(
            "no destination distinct from {source} after {DISTINCT_POINT_ATTEMPTS} draws"
        )))
    }

    pub fn kind(&self) -> EditKind {
        match self {
            Edit::Insertion { .. } => EditKind::Insertion,
            Edit::Deletion { .. } => EditKind::Deletion,
            Edit::Replacement { .. } => EditKind::Replacement,
            Edit::Moving { .. } => EditKind::Moving,
        }
    }

    /// Point this edit modifies. For Moving, where the element lands.
    pub fn target(&self) -> &Point {
        match self {
            Edit::Insertion { target, .. } => target,
            Edit::Deletion { target } => target,
            Edit::Replacement { target, .. } => target,
            Edit::Moving { destination, .. } => destination,
        }
    }

    /// Constituent atomic edits, in application order. An atomic edit yields
    /// itself; Moving decomposes into two atomics.
    pub fn atomic_operators(&self) -> Vec<Edit> {
        match self {
            Edit::Moving {
                source,
                destination,
            } => vec![
                Edit::Deletion {
                    target: source.clone(),
                },
                Edit::Insertion {
                    target: destination.clone(),
                    ingredient: source.clone(),
                },
            ],
            atomic => vec![atomic.clone()],
        }
    }

    /// Apply this edit to a working variant. The program is only consulted
    /// for pristine ingredient elements; the variant is transformed by move
    /// and handed back.
    pub fn apply(&self, program: &Program, mut variant: VariantContents) -> VariantContents {
        match self {
            Edit::Deletion { target } => {
                variant.delete(target);
            }
            Edit::Insertion { target, ingredient } => {
                if let Some(element) = program.element_at(ingredient) {
                    variant.insert_before(target, element);
                }
            }
            Edit::Replacement { target, ingredient } => {
                if let Some(element) = program.element_at(ingredient) {
                    variant.replace(target, element);
                }
            }
            Edit::Moving { .. } => {
                for atomic in self.atomic_operators() {
                    variant = atomic.apply(program, variant);
                }
            }
        }
        variant
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::Insertion { target, ingredient } => {
                write!(f, "Insertion({target} <- {ingredient})")
            }
            Edit::Deletion { target } => write!(f, "Deletion({target})"),
            Edit::Replacement { target, ingredient } => {
                write!(f, "Replacement({target} <- {ingredient})")
            }
            Edit::Moving {
                source,
                destination,
            } => write!(f, "Moving({source} -> {destination})"),
        }
    }
}
