//! Translation pipeline
//!
//! `Received -> Parsed -> Transformed -> Emitted -> Done`, where any stage
//! may end in `Failed`. The format selector is checked before the input is
//! looked at.

use crate::compose::{ComposeParser, Parsed};
use crate::emit::{Format, OutputFile};
use crate::error::{Failure, Result};
use crate::options::TranslateOptions;
use crate::rules::{RuleContext, RuleEngine};
use serde::{Deserialize, Serialize};

/// Outcome of a translation
///
/// `errors` alongside `output` marks a partial translation; `errors`
/// without `output` marks a failed one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Emitted artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Representability warnings in pipeline order
    pub warnings: Vec<String>,
    /// Representability errors, or the fatal error
    pub errors: Vec<String>,
    /// The artifact split into deployable files
    #[serde(skip)]
    pub files: Vec<OutputFile>,
}

impl Translation {
    /// Whether the translation produced output with errors
    pub fn is_partial(&self) -> bool {
        self.output.is_some() && !self.errors.is_empty()
    }
}

impl From<Failure> for Translation {
    fn from(failure: Failure) -> Self {
        Self {
            output: None,
            warnings: failure.warnings,
            errors: failure.error.messages(),
            files: Vec::new(),
        }
    }
}

/// Outcome of a parse-only validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the document parsed
    pub valid: bool,
    /// Number of services
    pub services: usize,
    /// Number of declared networks
    pub networks: usize,
    /// Number of declared volumes
    pub volumes: usize,
    /// Parse error, when invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compose translator
///
/// Holds no state between calls; one instance may serve any number of
/// concurrent translations.
pub struct Translator {
    options: TranslateOptions,
    rules: RuleEngine,
}

impl Translator {
    /// Create a translator with the built-in rules
    pub fn new(options: TranslateOptions) -> Self {
        Self {
            options,
            rules: RuleEngine::with_builtins(),
        }
    }

    /// Translate compose text into the format named by `format`
    pub fn translate(&self, input: &str, format: &str) -> Result<Translation, Failure> {
        self.translate_selected(input, Some(format))
    }

    /// Translate with an optional selector; `None` means `podman-compose`
    pub fn translate_selected(
        &self,
        input: &str,
        selector: Option<&str>,
    ) -> Result<Translation, Failure> {
        let format = Format::from_selector(selector).map_err(Failure::new)?;
        self.translate_to(input, format)
    }

    /// Translate compose text into `format`
    pub fn translate_to(&self, input: &str, format: Format) -> Result<Translation, Failure> {
        let span = tracing::debug_span!("translate", %format);
        let _guard = span.enter();
        tracing::debug!(stage = "received", bytes = input.len());

        let Parsed {
            document,
            mut diagnostics,
        } = ComposeParser::parse_str(input)?;
        tracing::debug!(stage = "parsed", services = document.services.len());

        let ctx = RuleContext {
            format,
            options: &self.options,
        };
        let rewrite = self.rules.run(document, &ctx).map_err(|failure| {
            let mut warnings = diagnostics.warnings();
            warnings.extend(failure.warnings);
            tracing::debug!(stage = "failed", error = %failure.error);
            Failure::new(failure.error).with_warnings(warnings)
        })?;
        diagnostics.extend(rewrite.diagnostics);
        tracing::debug!(stage = "transformed");

        let emission = format.emit(&rewrite.document, &self.options);
        diagnostics.extend(emission.diagnostics);
        tracing::debug!(
            stage = "emitted",
            warnings = diagnostics.warnings().len(),
            errors = diagnostics.errors().len()
        );

        Ok(Translation {
            output: Some(emission.output),
            warnings: diagnostics.warnings(),
            errors: diagnostics.errors(),
            files: emission.files,
        })
    }

    /// Parse without transforming or emitting
    pub fn validate(&self, input: &str) -> Validation {
        match ComposeParser::parse_str(input) {
            Ok(parsed) => Validation {
                valid: true,
                services: parsed.document.services.len(),
                networks: parsed.document.networks.len(),
                volumes: parsed.document.volumes.len(),
                error: None,
            },
            Err(failure) => Validation {
                error: Some(failure.error.to_string()),
                ..Validation::default()
            },
        }
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(TranslateOptions::default())
    }
}

/// Translate with default options
pub fn translate(input: &str, format: &str) -> Result<Translation, Failure> {
    Translator::default().translate(input, format)
}

/// Parse compose text into a document without translating it
pub fn parse(input: &str) -> Result<Parsed, Failure> {
    ComposeParser::parse_str(input)
}

/// Validate compose text with default options
pub fn validate(input: &str) -> Validation {
    Translator::default().validate(input)
}
