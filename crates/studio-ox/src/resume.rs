//! Resume data model, mirroring the backend's resume schema.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::StudioRequestError;

/// Optimization level used when the caller does not pick one.
pub const DEFAULT_OPTIMIZATION_LEVEL: &str = "basic";
/// Output format used when the caller does not pick one.
pub const DEFAULT_OUTPUT_FORMAT: &str = "html";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub major: String,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsibilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectExperience {
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub category: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proficiency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Certificate {
    pub name: String,
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResumeData {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub work_experience: Vec<WorkExperience>,
    #[serde(default)]
    pub project_experience: Vec<ProjectExperience>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<HashMap<String, String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awards: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publications: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_experience: Option<Vec<serde_json::Map<String, Value>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationSuggestion {
    pub category: String,
    pub priority: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationResult {
    pub optimized_resume: ResumeData,
    #[serde(default)]
    pub suggestions: Vec<OptimizationSuggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<HashMap<String, f64>>,
    pub optimization_level: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub supported_sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct OptimizeResumeRequest {
    pub resume_data: ResumeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub job_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub optimization_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct GenerateResumeRequest {
    pub resume_data: ResumeData,
    #[builder(into)]
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub output_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseResumeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResumeData>,
    #[serde(default)]
    pub parse_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizeResumeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OptimizationResult>,
    #[serde(default)]
    pub optimization_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateResumeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub generation_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListTemplatesResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub templates: Vec<TemplateInfo>,
}

/// `message` of a `success: false` envelope, or `fallback` when it is empty.
fn rejected(message: String, fallback: &str) -> StudioRequestError {
    let message = if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    };
    StudioRequestError::Rejected(message)
}

impl ParseResumeResponse {
    pub fn into_data(self) -> Result<ResumeData, StudioRequestError> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(rejected(self.message, "resume parsing failed")),
        }
    }
}

impl OptimizeResumeResponse {
    pub fn into_data(self) -> Result<OptimizationResult, StudioRequestError> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(rejected(self.message, "resume optimization failed")),
        }
    }
}

/// A generated resume file on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub file_id: String,
    pub download_url: Option<String>,
}

impl GenerateResumeResponse {
    pub fn into_file(self) -> Result<GeneratedFile, StudioRequestError> {
        match self.file_id {
            Some(file_id) if self.success => Ok(GeneratedFile {
                file_id,
                download_url: self.download_url,
            }),
            _ => Err(rejected(self.message, "resume generation failed")),
        }
    }
}

impl ListTemplatesResponse {
    pub fn into_templates(self) -> Result<Vec<TemplateInfo>, StudioRequestError> {
        if self.success {
            Ok(self.templates)
        } else {
            Err(rejected(self.message, "failed to load templates"))
        }
    }
}
