use studio_ox_common::{RequestTracker, user_message};

use super::StoreError;
use crate::{
    Studio,
    image::{to_data_url, validate_image},
    request::{VisionAnalyzeRequest, VisionGenerateRequest},
    response::VisionAnalyzeResponse,
};

/// Generated images and the latest image analysis.
#[derive(Debug)]
pub struct VisionStore {
    client: Studio,
    generated_images: Vec<String>,
    analysis_result: Option<VisionAnalyzeResponse>,
    loading: RequestTracker,
}

impl VisionStore {
    pub fn new(client: Studio) -> Self {
        Self {
            client,
            generated_images: Vec::new(),
            analysis_result: None,
            loading: RequestTracker::new(),
        }
    }

    /// Image URLs or data URLs from the last successful generation.
    pub fn generated_images(&self) -> &[String] {
        &self.generated_images
    }

    pub fn analysis_result(&self) -> Option<&VisionAnalyzeResponse> {
        self.analysis_result.as_ref()
    }

    pub fn loading(&self) -> &RequestTracker {
        &self.loading
    }

    pub fn error(&self) -> Option<String> {
        self.loading.error()
    }

    pub async fn generate_image(&mut self, request: &VisionGenerateRequest) -> Option<&[String]> {
        let response = self.loading.run(self.client.generate_image(request)).await?;
        self.generated_images = response.images;
        Some(self.generated_images.as_slice())
    }

    pub async fn analyze_image(
        &mut self,
        request: &VisionAnalyzeRequest,
    ) -> Option<&VisionAnalyzeResponse> {
        let response = self.loading.run(self.client.analyze_image(request)).await?;
        self.analysis_result = Some(response);
        self.analysis_result.as_ref()
    }

    /// Validate raw image bytes, then analyze them as a data URL.
    ///
    /// A rejected image is recorded as the store error without a request.
    pub async fn analyze_upload(
        &mut self,
        mime: &str,
        data: &[u8],
        analyze_type: Option<String>,
    ) -> Option<&VisionAnalyzeResponse> {
        if let Err(err) = validate_image(mime, data.len() as u64) {
            self.loading.set_error(user_message(&StoreError::from(err)));
            return None;
        }

        let request = VisionAnalyzeRequest::builder()
            .image(to_data_url(data, mime))
            .maybe_analyze_type(analyze_type)
            .build();
        self.analyze_image(&request).await
    }

    pub fn clear_results(&mut self) {
        self.generated_images.clear();
        self.analysis_result = None;
    }
}
