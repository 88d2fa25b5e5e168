// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::catalog::{Signature, BUILTIN_SIGNATURES};

const DATA_URI_SCHEME: &str = "data:";
const DATA_URI_BASE64_MARKER: &str = ";base64,";

/// Standard alphabet, canonical `=` padding, trailing bits tolerated.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Flags base64 text whose decoded bytes start with a known file signature.
#[derive(Debug, Clone, Copy)]
pub struct ContentClassifier {
    catalog: &'static [Signature],
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(BUILTIN_SIGNATURES)
    }
}

impl ContentClassifier {
    #[must_use]
    pub const fn new(catalog: &'static [Signature]) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &'static [Signature] {
        self.catalog
    }

    #[must_use]
    pub fn is_disguised_file(&self, candidate: &str) -> bool {
        self.detect(candidate).is_some()
    }

    /// Returns the first catalog entry matching the decoded payload.
    ///
    /// Line breaks are skipped, so wrapped encoder output is inspected too.
    /// Text that is not otherwise well-formed base64 yields `None`.
    #[must_use]
    pub fn detect(&self, candidate: &str) -> Option<&'static Signature> {
        let encoded = without_line_breaks(strip_data_uri_prefix(candidate));
        let decoded = STANDARD_LENIENT.decode(encoded.as_bytes()).ok()?;
        self.catalog.iter().find(|sig| sig.matches(&decoded))
    }
}

fn without_line_breaks(encoded: &str) -> Cow<'_, str> {
    if encoded.contains(['\r', '\n']) {
        Cow::Owned(encoded.chars().filter(|c| !matches!(c, '\r' | '\n')).collect())
    } else {
        Cow::Borrowed(encoded)
    }
}

/// Removes a leading `data:<media-type>;base64,` prefix, if present.
///
/// The media type must be non-empty and must not contain `;`.
#[must_use]
pub fn strip_data_uri_prefix(candidate: &str) -> &str {
    let Some(rest) = candidate.strip_prefix(DATA_URI_SCHEME) else {
        return candidate;
    };
    match rest.find(';') {
        Some(idx) if idx > 0 => rest[idx..]
            .strip_prefix(DATA_URI_BASE64_MARKER)
            .unwrap_or(candidate),
        _ => candidate,
    }
}
