//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::config::TranslateConfig;
use crate::error::{Diagnostic, TranslateError};
use crate::id::{Id, UuidV7Source};
use crate::translate::{self, TranslateOptions, TranslationResult};

/// Translate a HAR document into a flow for `workspace_id`.
/// `config_json` may be empty or a partial `TranslateConfig`.
/// Returns a JSON object with either `result` (success) or `errors` (failure).
#[wasm_bindgen]
pub fn translate_har(har_json: &str, workspace_id: &str, config_json: &str) -> JsValue {
    let output = translate_har_inner(har_json, workspace_id, config_json);
    serde_wasm_bindgen::to_value(&output).unwrap_or(JsValue::NULL)
}

fn translate_har_inner(har_json: &str, workspace_id: &str, config_json: &str) -> TranslateOutput {
    let workspace_id = match workspace_id.parse::<Id>() {
        Ok(id) => id,
        Err(e) => {
            return TranslateOutput::Errors(vec![ErrorDto {
                code: "W001".into(),
                phase: "Input".into(),
                message: format!("Invalid workspace id '{}': {}", workspace_id, e),
                entry_index: None,
            }]);
        }
    };

    let config = if config_json.trim().is_empty() {
        TranslateConfig::default()
    } else {
        match serde_json::from_str::<TranslateConfig>(config_json) {
            Ok(c) => c,
            Err(e) => {
                return TranslateOutput::Errors(vec![ErrorDto {
                    code: "W002".into(),
                    phase: "Input".into(),
                    message: format!("Failed to parse config JSON: {}", e),
                    entry_index: None,
                }]);
            }
        }
    };

    let mut ids = UuidV7Source;
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut observer = |d: Diagnostic| diagnostics.push(d);
    let options = TranslateOptions {
        config,
        ..TranslateOptions::new(&mut ids, &mut observer)
    };

    match translate::translate(har_json.as_bytes(), workspace_id, options) {
        Ok(result) => TranslateOutput::Success {
            result: Box::new(result),
            warnings: diagnostics.iter().map(|d| d.to_string()).collect(),
        },
        Err(e) => TranslateOutput::Errors(vec![ErrorDto::from(e)]),
    }
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
struct ErrorDto {
    code: String,
    phase: String,
    message: String,
    entry_index: Option<usize>,
}

impl From<TranslateError> for ErrorDto {
    fn from(e: TranslateError) -> Self {
        ErrorDto {
            code: e.code,
            phase: e.phase.to_string(),
            message: e.message,
            entry_index: e.entry_index,
        }
    }
}

#[derive(serde::Serialize)]
#[serde(tag = "status")]
enum TranslateOutput {
    #[serde(rename = "success")]
    Success {
        result: Box<TranslationResult>,
        warnings: Vec<String>,
    },
    #[serde(rename = "errors")]
    Errors(Vec<ErrorDto>),
}
