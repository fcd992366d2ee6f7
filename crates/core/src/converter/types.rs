//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::ParamsError;

/// The converter screens that drive remote jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    /// Video transcoding.
    Video,
    /// Audio transcoding.
    Audio,
    /// Document format conversion.
    Document,
    /// PDF password protection.
    PdfProtect,
}

impl ConverterKind {
    /// Every kind, in display order.
    pub const ALL: [ConverterKind; 4] = [
        ConverterKind::Video,
        ConverterKind::Audio,
        ConverterKind::Document,
        ConverterKind::PdfProtect,
    ];

    /// Returns the identifier used in config keys and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::PdfProtect => "pdf_protect",
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConverterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "document" => Ok(Self::Document),
            "pdf_protect" | "pdf-protect" => Ok(Self::PdfProtect),
            other => Err(format!("unknown converter kind: {}", other)),
        }
    }
}

/// A conversion parameter a kind may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    TargetFormat,
    Quality,
    Password,
}

impl ParamKey {
    /// The multipart field name sent to the service.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::TargetFormat => "target_format",
            Self::Quality => "quality",
            Self::Password => "password",
        }
    }
}

/// Parameters chosen by the user for a "convert" action.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Desired output format (e.g. "mp3", "docx").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,

    /// Quality preset understood by the service (e.g. "high", "720p").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    /// Password for PDF protection. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Any additional service-specific fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl fmt::Debug for ConversionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionParams")
            .field("target_format", &self.target_format)
            .field("quality", &self.quality)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("extra", &self.extra)
            .finish()
    }
}

impl ConversionParams {
    pub fn with_target_format(mut self, format: impl Into<String>) -> Self {
        self.target_format = Some(format.into());
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn get(&self, key: ParamKey) -> Option<&str> {
        let value = match key {
            ParamKey::TargetFormat => self.target_format.as_deref(),
            ParamKey::Quality => self.quality.as_deref(),
            ParamKey::Password => self.password.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Check that every required parameter is present and non-blank.
    pub fn check_required(&self, required: &[ParamKey]) -> Result<(), ParamsError> {
        match required.iter().find(|key| self.get(**key).is_none()) {
            Some(key) => Err(ParamsError::Missing {
                field: key.field_name(),
            }),
            None => Ok(()),
        }
    }

    /// Text fields to send alongside the file, in a stable order.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        for key in [ParamKey::TargetFormat, ParamKey::Quality, ParamKey::Password] {
            if let Some(value) = self.get(key) {
                fields.push((key.field_name().to_string(), value.to_string()));
            }
        }
        for (key, value) in &self.extra {
            fields.push((key.clone(), value.clone()));
        }
        fields
    }
}
