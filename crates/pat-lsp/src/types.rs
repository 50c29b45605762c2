//! LSP data structures, limited to the protocol surface the editor uses.
//! Unknown fields are tolerated and dropped on deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

impl TryFrom<u8> for DiagnosticSeverity {
    type Error = String;
    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(Self::Error),
            2 => Ok(Self::Warning),
            3 => Ok(Self::Information),
            4 => Ok(Self::Hint),
            other => Err(format!("invalid severity {other}")),
        }
    }
}

impl From<DiagnosticSeverity> for u8 {
    fn from(value: DiagnosticSeverity) -> u8 {
        match value {
            DiagnosticSeverity::Error => 1,
            DiagnosticSeverity::Warning => 2,
            DiagnosticSeverity::Information => 3,
            DiagnosticSeverity::Hint => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<DiagnosticSeverity>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    #[serde(default)]
    pub version: Option<u32>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_edit: Option<TextEdit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_text_edits: Option<Vec<TextEdit>>,
}

impl CompletionItem {
    /// The text actually inserted when the item is accepted.
    pub fn insertion(&self) -> &str {
        if let Some(edit) = &self.text_edit {
            &edit.new_text
        } else if let Some(text) = &self.insert_text {
            text
        } else {
            &self.label
        }
    }
}

/// Servers answer `textDocument/completion` with either a bare array or a
/// `CompletionList`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CompletionResponse {
    List {
        #[serde(default)]
        #[allow(dead_code)]
        is_incomplete: bool,
        items: Vec<CompletionItem>,
    },
    Items(Vec<CompletionItem>),
}

impl CompletionResponse {
    pub fn into_items(self) -> Vec<CompletionItem> {
        match self {
            Self::List { items, .. } => items,
            Self::Items(items) => items,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterInformation {
    /// Either a substring of the signature label or a `[start, end)` offset
    /// pair; kept raw since rendering only underlines it.
    pub label: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureInformation {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<Value>,
    #[serde(default)]
    pub parameters: Vec<ParameterInformation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHelp {
    pub signatures: Vec<SignatureInformation>,
    #[serde(default)]
    pub active_signature: Option<u32>,
    #[serde(default)]
    pub active_parameter: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub version: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionedTextDocumentIdentifier {
    pub uri: String,
    pub version: u32,
}

/// One ranged replacement in a `didChange` notification. The range is the
/// span being replaced in the *previous* revision of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDocumentContentChangeEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeParams {
    pub text_document: VersionedTextDocumentIdentifier,
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentPositionParams {
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diagnostic_tolerates_unknown_fields() {
        let diag: Diagnostic = serde_json::from_value(json!({
            "range": {"start": {"line": 0, "character": 1}, "end": {"line": 0, "character": 4}},
            "severity": 2,
            "message": "unused variable",
            "code": "E0001",
            "relatedInformation": [],
        }))
        .unwrap();
        assert_eq!(diag.severity, Some(DiagnosticSeverity::Warning));
        assert_eq!(diag.message, "unused variable");
    }

    #[test]
    fn completion_response_both_shapes() {
        let bare: CompletionResponse =
            serde_json::from_value(json!([{"label": "foo"}])).unwrap();
        assert_eq!(bare.into_items()[0].label, "foo");

        let list: CompletionResponse = serde_json::from_value(json!({
            "isIncomplete": false,
            "items": [{"label": "bar", "textEdit": {
                "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 3}},
                "newText": "bar()"
            }}]
        }))
        .unwrap();
        let items = list.into_items();
        assert_eq!(items[0].insertion(), "bar()");
    }

    #[test]
    fn completion_insertion_fallback_order() {
        let label_only = CompletionItem {
            label: "name".into(),
            ..Default::default()
        };
        assert_eq!(label_only.insertion(), "name");

        let with_insert = CompletionItem {
            label: "name".into(),
            insert_text: Some("name()".into()),
            ..Default::default()
        };
        assert_eq!(with_insert.insertion(), "name()");
    }

    #[test]
    fn did_change_serializes_camel_case() {
        let params = DidChangeParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: "file:///a.rs".into(),
                version: 4,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: Some(Range::new(Position::new(0, 0), Position::new(0, 0))),
                text: "x".into(),
            }],
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["textDocument"]["version"], 4);
        assert_eq!(value["contentChanges"][0]["text"], "x");
    }

    #[test]
    fn invalid_severity_is_a_parse_error() {
        let result: Result<Diagnostic, _> = serde_json::from_value(json!({
            "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 0}},
            "severity": 9,
            "message": "?",
        }));
        assert!(result.is_err());
    }
}
