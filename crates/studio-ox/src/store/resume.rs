use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Value, json};
use studio_ox_common::{RequestTracker, user_message};

use super::{StoreError, clear_errors, first_error};
use crate::{
    Studio,
    logger::{LogBuffer, LogLevel},
    resume::{
        DEFAULT_OPTIMIZATION_LEVEL, DEFAULT_OUTPUT_FORMAT, GenerateResumeRequest,
        OptimizationResult, OptimizeResumeRequest, ResumeData, TemplateInfo,
    },
};

const LOG_SOURCE: &str = "ResumeStore";
const NO_RESUME: &str = "upload and parse a resume first";
const NOTHING_TO_GENERATE: &str = "upload or optimize a resume first";

/// Resume parsing, optimization and generation state.
///
/// Unlike the other stores, operations here record their error in state and
/// also return it.
#[derive(Debug)]
pub struct ResumeStore {
    client: Studio,
    logger: Option<Arc<LogBuffer>>,
    current_resume: Option<ResumeData>,
    optimized_resume: Option<ResumeData>,
    optimization_result: Option<OptimizationResult>,
    templates: Vec<TemplateInfo>,
    selected_template: Option<TemplateInfo>,
    generated_file_id: Option<String>,
    generated_file_url: Option<String>,
    loading: RequestTracker,
    parsing: RequestTracker,
    optimizing: RequestTracker,
    generating: RequestTracker,
}

impl ResumeStore {
    pub fn new(client: Studio) -> Self {
        Self {
            client,
            logger: None,
            current_resume: None,
            optimized_resume: None,
            optimization_result: None,
            templates: Vec::new(),
            selected_template: None,
            generated_file_id: None,
            generated_file_url: None,
            loading: RequestTracker::new(),
            parsing: RequestTracker::new(),
            optimizing: RequestTracker::new(),
            generating: RequestTracker::new(),
        }
    }

    /// Also record progress and failures in `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<LogBuffer>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn current_resume(&self) -> Option<&ResumeData> {
        self.current_resume.as_ref()
    }

    pub fn optimized_resume(&self) -> Option<&ResumeData> {
        self.optimized_resume.as_ref()
    }

    pub fn optimization_result(&self) -> Option<&OptimizationResult> {
        self.optimization_result.as_ref()
    }

    pub fn templates(&self) -> &[TemplateInfo] {
        &self.templates
    }

    pub fn selected_template(&self) -> Option<&TemplateInfo> {
        self.selected_template.as_ref()
    }

    pub fn generated_file_id(&self) -> Option<&str> {
        self.generated_file_id.as_deref()
    }

    pub fn generated_file_url(&self) -> Option<&str> {
        self.generated_file_url.as_deref()
    }

    pub fn has_resume(&self) -> bool {
        self.current_resume.is_some()
    }

    pub fn has_optimized_resume(&self) -> bool {
        self.optimized_resume.is_some()
    }

    pub fn has_templates(&self) -> bool {
        !self.templates.is_empty()
    }

    /// Tracker for template loading.
    pub fn loading(&self) -> &RequestTracker {
        &self.loading
    }

    pub fn parsing(&self) -> &RequestTracker {
        &self.parsing
    }

    pub fn optimizing(&self) -> &RequestTracker {
        &self.optimizing
    }

    pub fn generating(&self) -> &RequestTracker {
        &self.generating
    }

    pub fn error(&self) -> Option<String> {
        first_error(&self.trackers())
    }

    /// Select a loaded template by id; unknown ids clear the selection.
    pub fn select_template(&mut self, template_id: &str) -> Option<&TemplateInfo> {
        self.selected_template = self
            .templates
            .iter()
            .find(|template| template.id == template_id)
            .cloned();
        self.selected_template.as_ref()
    }

    /// Upload and parse a resume file. A new resume discards earlier
    /// optimization output.
    pub async fn parse_resume(
        &mut self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<&ResumeData, StoreError> {
        clear_errors(&self.trackers());
        self.log(
            LogLevel::Info,
            "parsing resume file",
            json!({ "file_name": file_name }),
        );

        let client = &self.client;
        let result = self
            .parsing
            .track(async {
                let response = client.parse_resume(file_name, data).await?;
                let parse_time = response.parse_time;
                Ok::<_, StoreError>((response.into_data()?, parse_time))
            })
            .await;

        match result {
            Ok((resume, parse_time)) => {
                self.log(
                    LogLevel::Info,
                    "resume parsed",
                    json!({ "parse_time": parse_time }),
                );
                self.optimized_resume = None;
                self.optimization_result = None;
                Ok(&*self.current_resume.insert(resume))
            }
            Err(err) => Err(self.failed("resume parsing failed", err)),
        }
    }

    /// Optimize the parsed resume, optionally for a job description.
    ///
    /// `optimization_level` defaults to `basic`.
    pub async fn optimize_resume(
        &mut self,
        job_description: Option<String>,
        optimization_level: Option<&str>,
    ) -> Result<&OptimizationResult, StoreError> {
        clear_errors(&self.trackers());
        let Some(resume) = self.current_resume.clone() else {
            self.optimizing.set_error(NO_RESUME);
            return Err(StoreError::MissingResume(NO_RESUME));
        };

        let level = optimization_level.unwrap_or(DEFAULT_OPTIMIZATION_LEVEL);
        self.log(
            LogLevel::Info,
            "optimizing resume",
            json!({ "optimization_level": level }),
        );

        let request = OptimizeResumeRequest::builder()
            .resume_data(resume)
            .maybe_job_description(job_description)
            .optimization_level(level)
            .build();

        let client = &self.client;
        let result = self
            .optimizing
            .track(async {
                let response = client.optimize_resume(&request).await?;
                Ok::<_, StoreError>(response.into_data()?)
            })
            .await;

        match result {
            Ok(optimization) => {
                self.log(
                    LogLevel::Info,
                    "resume optimized",
                    json!({
                        "score": optimization.score,
                        "suggestions": optimization.suggestions.len(),
                    }),
                );
                self.optimized_resume = Some(optimization.optimized_resume.clone());
                Ok(&*self.optimization_result.insert(optimization))
            }
            Err(err) => Err(self.failed("resume optimization failed", err)),
        }
    }

    /// Render the optimized resume, or the parsed one when there is none.
    ///
    /// `output_format` defaults to `html`. Returns the generated file id.
    pub async fn generate_resume(
        &mut self,
        template_id: &str,
        output_format: Option<&str>,
    ) -> Result<&str, StoreError> {
        clear_errors(&self.trackers());
        let Some(resume) = self
            .optimized_resume
            .clone()
            .or_else(|| self.current_resume.clone())
        else {
            self.generating.set_error(NOTHING_TO_GENERATE);
            return Err(StoreError::MissingResume(NOTHING_TO_GENERATE));
        };

        let format = output_format.unwrap_or(DEFAULT_OUTPUT_FORMAT);
        self.log(
            LogLevel::Info,
            "generating resume",
            json!({ "template_id": template_id, "output_format": format }),
        );

        let request = GenerateResumeRequest::builder()
            .resume_data(resume)
            .template_id(template_id)
            .output_format(format)
            .build();

        let client = &self.client;
        let result = self
            .generating
            .track(async {
                let response = client.generate_resume(&request).await?;
                let generation_time = response.generation_time;
                Ok::<_, StoreError>((response.into_file()?, generation_time))
            })
            .await;

        match result {
            Ok((file, generation_time)) => {
                self.log(
                    LogLevel::Info,
                    "resume generated",
                    json!({ "file_id": file.file_id, "generation_time": generation_time }),
                );
                self.generated_file_url = file.download_url;
                Ok(self.generated_file_id.insert(file.file_id).as_str())
            }
            Err(err) => Err(self.failed("resume generation failed", err)),
        }
    }

    pub async fn load_templates(&mut self) -> Result<&[TemplateInfo], StoreError> {
        clear_errors(&self.trackers());
        self.log(LogLevel::Info, "loading templates", json!({}));

        let client = &self.client;
        let result = self
            .loading
            .track(async {
                let response = client.list_templates().await?;
                Ok::<_, StoreError>(response.into_templates()?)
            })
            .await;

        match result {
            Ok(templates) => {
                self.log(
                    LogLevel::Info,
                    "templates loaded",
                    json!({ "count": templates.len() }),
                );
                self.templates = templates;
                Ok(self.templates.as_slice())
            }
            Err(err) => Err(self.failed("loading templates failed", err)),
        }
    }

    /// Fetch a generated file. Records a failure without toggling any tracker.
    pub async fn download_resume(&self, file_id: &str) -> Result<Bytes, StoreError> {
        match self.client.download_resume(file_id).await {
            Ok(bytes) => {
                self.log(
                    LogLevel::Info,
                    "resume downloaded",
                    json!({ "file_id": file_id, "size": bytes.len() }),
                );
                Ok(bytes)
            }
            Err(err) => {
                let err = StoreError::from(err);
                self.loading.set_error(user_message(&err));
                Err(self.failed("resume download failed", err))
            }
        }
    }

    /// Forget the resume and everything derived from it; templates are kept.
    pub fn reset(&mut self) {
        self.current_resume = None;
        self.optimized_resume = None;
        self.optimization_result = None;
        self.selected_template = None;
        self.generated_file_id = None;
        self.generated_file_url = None;
        clear_errors(&self.trackers());
    }

    fn trackers(&self) -> [&RequestTracker; 4] {
        [
            &self.loading,
            &self.parsing,
            &self.optimizing,
            &self.generating,
        ]
    }

    fn failed(&self, message: &str, err: StoreError) -> StoreError {
        self.log(
            LogLevel::Error,
            message,
            json!({ "error": user_message(&err) }),
        );
        err
    }

    fn log(&self, level: LogLevel, message: &str, data: Value) {
        match &self.logger {
            Some(logger) => logger.record(level, message, Some(data), Some(LOG_SOURCE)),
            None => log::log!(log::Level::from(level), "[{LOG_SOURCE}] {message} {data}"),
        }
    }
}
