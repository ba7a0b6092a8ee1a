/// Granularity a program is parsed at.
///
/// Each level owns its representation in [`FileContents`] and supplies the
/// same small set of operations, so edit and patch code never looks inside.
/// Line granularity is the one currently shipped; further levels extend the
/// enums below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One modification point per source line.
    Line,
}

impl Granularity {
    /// Parse source text into contents at this granularity.
    pub fn parse(self, text: &str) -> FileContents {
        match self {
            Granularity::Line => FileContents::Lines(text.lines().map(str::to_string).collect()),
        }
    }
}

/// Parsed representation of one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    Lines(Vec<String>),
}

/// One element extracted from a file, tagged with the granularity it came
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Line(String),
}

impl Element {
    /// Source text of the element.
    pub fn as_text(&self) -> &str {
        match self {
            Element::Line(text) => text,
        }
    }
}

impl FileContents {
    /// Number of addressable elements.
    pub fn len(&self) -> usize {
        match self {
            FileContents::Lines(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element indices at which edits may anchor, in file order.
    pub fn modification_points(&self) -> Vec<usize> {
        match self {
            FileContents::Lines(lines) => (0..lines.len()).collect(),
        }
    }

    /// Copy of the element at `index`.
    pub fn element(&self, index: usize) -> Option<Element> {
        match self {
            FileContents::Lines(lines) => lines.get(index).cloned().map(Element::Line),
        }
    }

    /// Render back to source text.
    ///
    /// Lines are joined with `\n` and end with a final newline; a source
    /// file that lacked one is normalized on the way through.
    pub fn to_source(&self) -> String {
        match self {
            FileContents::Lines(lines) => {
                if lines.is_empty() {
                    String::new()
                } else {
                    let mut source = lines.join("\n");
                    source.push('\n');
                    source
                }
            }
        }
    }

    pub(crate) fn insert(&mut self, index: usize, element: Element) {
        match (self, element) {
            (FileContents::Lines(lines), Element::Line(text)) => lines.insert(index, text),
        }
    }

    pub(crate) fn remove(&mut self, index: usize) -> Element {
        match self {
            FileContents::Lines(lines) => Element::Line(lines.remove(index)),
        }
    }

    pub(crate) fn replace(&mut self, index: usize, element: Element) {
        match (self, element) {
            (FileContents::Lines(lines), Element::Line(text)) => lines[index] = text,
        }
    }
}
