//! System prompt rendering for commit and review requests.

use crate::extract::ResponseMode;
use crate::types::{GenerationRequest, MessageStyle, RequestKind};

const COMMIT_TEMPLATE: &str = "You write git commit messages for the diff supplied by the user.\n\
Write in {locale}. Keep each subject line under {max_length} characters.\n\
Produce {candidate_count} distinct candidate message(s).\n\
{style}\n\
{body}\n\
{format}";

const REVIEW_TEMPLATE: &str = "You review the code change supplied by the user as a diff.\n\
Write in {locale}. Summarize the most important finding in a headline under {max_length} characters, \
then explain it.\n\
Produce {candidate_count} distinct review summary(ies).\n\
{format}";

const CONVENTIONAL_GUIDE: &str = "Follow the Conventional Commits format `<type>(<optional scope>): <description>`.\n\
Use one of: feat, fix, docs, style, refactor, perf, test, build, ci, chore, revert.\n\
Start the description with a lowercase letter.";

const GITMOJI_GUIDE: &str = "Start every subject with a gitmoji code followed by a description, for example:\n\
:sparkles: introduce new features\n\
:bug: fix a bug\n\
:memo: add or update documentation\n\
:recycle: refactor code\n\
:white_check_mark: add or update tests";

const PLAIN_GUIDE: &str = "Use a concise imperative subject line.";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    commit_template: String,
    review_template: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            commit_template: COMMIT_TEMPLATE.to_string(),
            review_template: REVIEW_TEMPLATE.to_string(),
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit_template(mut self, template: impl Into<String>) -> Self {
        self.commit_template = template.into();
        self
    }

    pub fn with_review_template(mut self, template: impl Into<String>) -> Self {
        self.review_template = template.into();
        self
    }

    /// Render the system prompt for one request and the backend's reply format.
    pub fn system_prompt(&self, request: &GenerationRequest, mode: ResponseMode) -> String {
        let template = match request.request_kind {
            RequestKind::Commit => &self.commit_template,
            RequestKind::Review => &self.review_template,
        };

        let body_rule = if request.include_body {
            "Add a short body explaining what changed and why."
        } else {
            "Do not write a body; subject lines only."
        };

        template
            .replace("{locale}", &request.locale)
            .replace("{max_length}", &request.max_length.to_string())
            .replace("{candidate_count}", &request.candidate_count.to_string())
            .replace("{style}", style_guide(request.message_style))
            .replace("{body}", body_rule)
            .replace("{format}", &format_rule(request, mode))
    }
}

fn style_guide(style: MessageStyle) -> &'static str {
    match style {
        MessageStyle::Plain => PLAIN_GUIDE,
        MessageStyle::Conventional => CONVENTIONAL_GUIDE,
        MessageStyle::Gitmoji => GITMOJI_GUIDE,
    }
}

fn format_rule(request: &GenerationRequest, mode: ResponseMode) -> String {
    match mode {
        ResponseMode::Json | ResponseMode::Auto => {
            let shape = if request.include_body {
                r#"[{"subject": "...", "body": "...", "footer": "..."}]"#
            } else {
                r#"[{"subject": "..."}]"#
            };
            format!(
                "Respond with a JSON array only, shaped like {}. No prose outside the JSON.",
                shape
            )
        }
        ResponseMode::Prose => match request.request_kind {
            RequestKind::Commit => {
                "Respond with one candidate subject per line and nothing else.".to_string()
            }
            RequestKind::Review => {
                "Respond with the headline on the first line followed by the explanation."
                    .to_string()
            }
        },
    }
}
