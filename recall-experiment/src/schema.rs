//! Column detection for the stimulus table.
//!
//! Stimulus sheets have gone through several naming conventions. The
//! resolver runs once over the header row and produces column indices; the
//! trial builder only ever reads cells through the typed accessors here.

use std::fmt;

use recall_core::QUESTIONS_PER_TRIAL;

use crate::table::Row;

const IMAGE_COLUMNS: &[&str] = &[
    "ImageFileName",
    "image",
    "Image",
    "img",
    "Img",
    "image_path",
    "ImagePath",
    "ImageURL",
    "imageURL",
];

const VARIANT_IMAGE_COLUMNS: &[&str] = &["V1", "V2", "V3", "V4"];

const CONTEXT_COLUMNS: &[&str] = &[
    "TheContext",
    "context",
    "Context",
    "CONTEXT",
    "title",
    "Title",
    "כותרת",
    "message",
    "Message",
];

const COLOR_COLUMNS: &[&str] = &[
    "color",
    "Color",
    "colour",
    "Colour",
    "צבע",
    "dominant_color",
    "DominantColor",
    "graph_color",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    NoImageColumn,
    NoContextColumn,
    NoQuestionColumns,
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoImageColumn => f.write_str(
                "no image column found (expected ImageFileName or V1..V4); placeholders will be shown",
            ),
            Self::NoContextColumn => f.write_str("no context column found; context screens will be empty"),
            Self::NoQuestionColumns => f.write_str(
                "no question columns found (expected Question1Text / Q1); placeholder questions will be used",
            ),
        }
    }
}

/// Columns making up one question block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionColumns {
    /// 1-based question number as named in the sheet.
    pub number: usize,
    pub text: usize,
    pub options: Vec<usize>,
    pub correct: Option<usize>,
    pub kind: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub images: Vec<usize>,
    pub context: Option<usize>,
    pub color: Option<usize>,
    pub questions: Vec<QuestionColumns>,
}

fn position(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn first_of<S: AsRef<str>>(headers: &[String], candidates: &[S]) -> Option<usize> {
    candidates.iter().find_map(|c| position(headers, c.as_ref()))
}

impl Schema {
    pub fn resolve(headers: &[String]) -> (Self, Vec<SchemaWarning>) {
        let mut warnings = Vec::new();

        let images = match first_of(headers, IMAGE_COLUMNS) {
            Some(col) => vec![col],
            None => headers
                .iter()
                .enumerate()
                .filter(|(_, h)| {
                    VARIANT_IMAGE_COLUMNS
                        .iter()
                        .any(|v| h.eq_ignore_ascii_case(v))
                })
                .map(|(i, _)| i)
                .collect(),
        };
        if images.is_empty() {
            warnings.push(SchemaWarning::NoImageColumn);
        }

        let context = first_of(headers, CONTEXT_COLUMNS);
        if context.is_none() {
            warnings.push(SchemaWarning::NoContextColumn);
        }

        let questions: Vec<_> = (1..=QUESTIONS_PER_TRIAL)
            .filter_map(|n| Self::question_columns(headers, n))
            .collect();
        if questions.is_empty() {
            warnings.push(SchemaWarning::NoQuestionColumns);
        }

        let schema = Self {
            images,
            context,
            color: first_of(headers, COLOR_COLUMNS),
            questions,
        };
        (schema, warnings)
    }

    fn question_columns(headers: &[String], n: usize) -> Option<QuestionColumns> {
        let text = first_of(
            headers,
            &[format!("Question{n}Text"), format!("Question{n}"), format!("Q{n}")],
        )?;
        let options = ["A", "B", "C", "D"]
            .iter()
            .map(|x| format!("Q{n}Option{x}"))
            .chain(["A", "B", "C", "D"].iter().map(|x| format!("Q{n}_{x}")))
            .filter_map(|name| position(headers, &name))
            .collect();
        let correct = first_of(
            headers,
            &[
                format!("Q{n}CorrectAnswer"),
                format!("Q{n}Correct"),
                format!("Q{n}_correct"),
                format!("Q{n}_Correct"),
            ],
        );
        let kind = first_of(headers, &[format!("Q{n}Type"), format!("Q{n}_type")]);
        Some(QuestionColumns {
            number: n,
            text,
            options,
            correct,
            kind,
        })
    }

    pub fn context<'a>(&self, row: &Row<'a>) -> Option<&'a str> {
        self.context.and_then(|c| row.cell(c))
    }

    pub fn color<'a>(&self, row: &Row<'a>) -> Option<&'a str> {
        self.color.and_then(|c| row.cell(c))
    }

    /// Non-empty image cells in column order.
    pub fn image_candidates<'a>(&self, row: &Row<'a>) -> Vec<&'a str> {
        self.images.iter().filter_map(|&c| row.cell(c)).collect()
    }
}

impl QuestionColumns {
    pub fn text<'a>(&self, row: &Row<'a>) -> Option<&'a str> {
        row.cell(self.text)
    }

    pub fn options<'a>(&self, row: &Row<'a>) -> Vec<&'a str> {
        self.options.iter().filter_map(|&c| row.cell(c)).collect()
    }

    pub fn correct<'a>(&self, row: &Row<'a>) -> Option<&'a str> {
        self.correct.and_then(|c| row.cell(c))
    }

    pub fn kind<'a>(&self, row: &Row<'a>) -> Option<&'a str> {
        self.kind.and_then(|c| row.cell(c))
    }
}
