//! Prompt templates for paper analysis.
//!
//! Every template shares the same frame: a role line, the paper's metadata,
//! the full paper text, a kind-specific list of sections to produce, and
//! optional caller instructions. The paper text is inserted verbatim.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::models::LibraryItem;

/// Analysis flavours offered by `paper analyze --kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PromptKind {
    Comprehensive,
    QuickSummary,
    TechnicalDeepDive,
    LiteratureReview,
    Methodology,
    CitationAnalysis,
}

impl PromptKind {
    pub const ALL: [PromptKind; 6] = [
        PromptKind::Comprehensive,
        PromptKind::QuickSummary,
        PromptKind::TechnicalDeepDive,
        PromptKind::LiteratureReview,
        PromptKind::Methodology,
        PromptKind::CitationAnalysis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Comprehensive => "comprehensive",
            PromptKind::QuickSummary => "quick-summary",
            PromptKind::TechnicalDeepDive => "technical-deep-dive",
            PromptKind::LiteratureReview => "literature-review",
            PromptKind::Methodology => "methodology",
            PromptKind::CitationAnalysis => "citation-analysis",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PromptKind::Comprehensive => "Complete analysis with all sections (default)",
            PromptKind::QuickSummary => "Brief summary with key points",
            PromptKind::TechnicalDeepDive => "Detailed technical and methodological analysis",
            PromptKind::LiteratureReview => "Focus on citations and relationship to existing work",
            PromptKind::Methodology => "In-depth analysis of research methods",
            PromptKind::CitationAnalysis => "Analysis of references and scholarly influences",
        }
    }

    fn role(&self) -> &'static str {
        match self {
            PromptKind::Comprehensive => {
                "You are an expert research assistant analyzing an academic paper. \
                 Produce a thorough, well-structured analysis useful to researchers and students."
            }
            PromptKind::QuickSummary => {
                "You are an expert research assistant. Summarize this academic paper concisely."
            }
            PromptKind::TechnicalDeepDive => {
                "You are an expert technical reviewer examining the methods and technical \
                 substance of this academic paper."
            }
            PromptKind::LiteratureReview => {
                "You are an expert researcher placing this paper within the broader academic literature."
            }
            PromptKind::Methodology => {
                "You are an expert methodologist assessing the research methods of this academic paper."
            }
            PromptKind::CitationAnalysis => {
                "You are an expert bibliographer studying the citations and references of this academic paper."
            }
        }
    }

    fn sections(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            PromptKind::Comprehensive => &[
                ("Executive Summary", "Two or three paragraphs on what the paper is about and why it matters."),
                ("Research Context and Motivation", "The problem addressed, why it is important, and the gap it fills."),
                ("Methodology", "Research design, data collection and analysis, tools, key assumptions."),
                ("Key Findings and Results", "Main results, the evidence behind them, and how robust they are."),
                ("Contributions to the Field", "Novel contributions and how they compare to prior work."),
                ("Limitations and Future Work", "Acknowledged limitations, open questions, suggested directions."),
                ("Key References and Related Work", "The most important cited work and the foundations it builds on."),
            ],
            PromptKind::QuickSummary => &[
                ("In One Sentence", "The whole paper in a single sentence."),
                ("Key Points", "Three to five bullets: problem, approach, findings, significance."),
                ("Who Should Read This", "The audience that benefits most."),
            ],
            PromptKind::TechnicalDeepDive => &[
                ("Technical Approach", "Methods, algorithms, techniques, and their innovations."),
                ("Experimental Design", "Setup, datasets or benchmarks, controls, validation."),
                ("Mathematical/Theoretical Foundation", "Models, key equations, rigor of the formal treatment."),
                ("Implementation Details", "Tools and platforms, notable choices, reproducibility."),
                ("Results and Evaluation", "Metrics, baselines, statistical testing."),
                ("Technical Limitations", "Constraints and assumptions that may not hold in practice."),
            ],
            PromptKind::LiteratureReview => &[
                ("Research Lineage", "Prior work this builds on and how the area developed."),
                ("Key Citations and Influences", "Important papers, researchers, and schools of thought."),
                ("Positioning in the Field", "Debates engaged and views challenged or supported."),
                ("Gaps Addressed", "The literature gap and how well it is filled."),
                ("Related Work Comparison", "Similar approaches, differences, relative strengths."),
                ("Influence and Reception", "Likely impact and new directions opened."),
            ],
            PromptKind::Methodology => &[
                ("Research Design", "Type of design and its fit to the research questions."),
                ("Data Collection", "What data, how it was gathered, sampling, possible bias."),
                ("Analysis Methods", "Analytical techniques and their appropriateness."),
                ("Validity and Reliability", "Internal and external validity, reliability checks, threats."),
                ("Ethical Considerations", "Ethical issues and how they are handled."),
                ("Methodological Strengths", "What is done particularly well."),
                ("Methodological Limitations", "Weaknesses and their effect on the conclusions."),
            ],
            PromptKind::CitationAnalysis => &[
                ("Key References", "Foundational, methodological, empirical, theoretical, and recent work."),
                ("Citation Pattern Analysis", "Breadth, time span, concentration, notable omissions."),
                ("Influential Authors and Works", "Most cited authors and recurring seminal papers."),
                ("Interdisciplinary Connections", "Fields drawn on and how they are combined."),
                ("Citation Context", "Why the most important references are cited and what is taken from them."),
            ],
        }
    }

    fn closing(&self) -> &'static str {
        match self {
            PromptKind::Comprehensive => {
                "Write the analysis in clear markdown. Be precise, objective, and thorough."
            }
            PromptKind::QuickSummary => "Keep the response short and focused on what matters most.",
            PromptKind::TechnicalDeepDive => {
                "Favor technical depth: include specific details, equations, and terminology."
            }
            PromptKind::LiteratureReview => {
                "Emphasize connections, influences, and the scholarly conversation the paper joins."
            }
            PromptKind::Methodology => {
                "Focus on the soundness, rigor, and appropriateness of the methods."
            }
            PromptKind::CitationAnalysis => {
                "Focus on the scholarly foundations and intellectual influences of the work."
            }
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        PromptKind::ALL
            .into_iter()
            .find(|k| k.name() == normalized)
            .ok_or_else(|| format!("unknown analysis kind: {}", s))
    }
}

/// Metadata shown to the model above the paper text. Empty fields are skipped.
#[derive(Debug, Clone, Default)]
pub struct PaperMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<String>,
    pub publication: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
}

impl From<&LibraryItem> for PaperMetadata {
    fn from(item: &LibraryItem) -> Self {
        Self {
            title: item.title.clone(),
            authors: item.authors.clone(),
            year: item.year.clone(),
            publication: item.publication.clone(),
            doi: item.doi.clone(),
            url: item.url.clone(),
        }
    }
}

impl PaperMetadata {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        let mut push = |label: &str, value: Option<&str>| {
            if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
                lines.push(format!("- {}: {}", label, v));
            }
        };
        push("Title", self.title.as_deref());
        let authors = self.authors.join(", ");
        push("Authors", Some(authors.as_str()));
        push("Year", self.year.as_deref());
        push("Publication", self.publication.as_deref());
        push("DOI", self.doi.as_deref());
        push("URL", self.url.as_deref());

        if lines.is_empty() {
            "- No metadata available".to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Render the full prompt for `kind`.
pub fn build_prompt(
    kind: PromptKind,
    paper_text: &str,
    metadata: &PaperMetadata,
    custom_instructions: Option<&str>,
) -> String {
    let mut prompt = String::with_capacity(paper_text.len() + 2048);

    prompt.push_str(kind.role());
    prompt.push_str("\n\nPaper Information:\n");
    prompt.push_str(&metadata.render());
    prompt.push_str("\n\nFull Text:\n");
    prompt.push_str(paper_text);
    prompt.push_str("\n\nWrite the analysis with these sections:\n");

    for (heading, guidance) in kind.sections() {
        prompt.push_str("\n## ");
        prompt.push_str(heading);
        prompt.push('\n');
        prompt.push_str(guidance);
        prompt.push('\n');
    }

    if let Some(extra) = custom_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\nAdditional instructions:\n");
        prompt.push_str(extra);
        prompt.push('\n');
    }

    prompt.push('\n');
    prompt.push_str(kind.closing());
    prompt
}
