use std::sync::Arc;

use crate::gap_analysis::coverage::CoverageSettings;
use crate::gap_analysis::orchestrator::GapAnalysisService;
use crate::keywords::extraction::KeywordExtractionService;
use crate::language::LanguageDetector;
use crate::standardization::KeywordStandardizer;

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is built once at startup and is read-only afterwards, except
/// for the standardizer tables swapped by an explicit reload.
#[derive(Clone)]
pub struct AppState {
    pub gap_analysis: Arc<GapAnalysisService>,
    pub keyword_extraction: Arc<KeywordExtractionService>,
    pub detector: Arc<LanguageDetector>,
    pub standardizer: Arc<KeywordStandardizer>,
    pub coverage: CoverageSettings,
}
