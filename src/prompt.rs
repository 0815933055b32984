//! Request modes and the fixed prompts sent upstream for each of them.

use crate::parser::Dialect;
use crate::upstream::types::{CompletionRequest, SamplingParams};

const EXPLAIN_TERSE_INSTRUCTION: &str = "You are a cron expression explainer. \
I will give you a cron expression and you will explain it to me. \
You will just explain each part of the expression. \
Make sure to only explain the expression, not the meaning of the expression. \
Answer with one line per field in the format 'value: description'. \
For example, for the expression 0 5 * * * you will say:\n\
0: at minute 0\n\
5: past hour 5\n\
*: on every day of the month\n\
*: in every month\n\
*: on every day of the week";

const EXPLAIN_DETAILED_INSTRUCTION: &str = "You are a cron expression explainer. \
I will give you a cron expression and you will explain it to me. \
You will just explain each part of the expression. \
Make sure to only explain the expression, not the meaning of the expression. \
Make sure to explain each character. \
For example, if I give you the expression 0 5 0 0 0, you will say:\n\
0 minute | (0 - 59) | what does this mean?\n\
5 hours | (0 - 23) | what does this mean?\n\
0 day of month | (1 - 31) | what does this mean?\n\
0 month | (1 - 12) | what does this mean?\n\
0 day of week | (0 - 6) | what does this mean?\n\
Make sure to follow the following format, one line per character: \
'character and meaning | (range) | what does this mean?'. \
Make sure to give what does this mean in the following format: \
'This expression means that the job ...'.";

const GENERATE_INSTRUCTION: &str = "You are a cron expression generator. \
I will give you a description of a cron expression and you will generate it for me. \
You will just generate each part of the expression. \
For example, if I give you the description: \
'At 0 minutes past 0 hours on 0 day of the month, every month', you will say: '0 0 0 0 0'. \
Make sure not to include any extra characters.";

/// What the caller asked for. Fixed for the lifetime of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Explain a cron expression, either row by row (`detailed`) or as a short summary
    Explain { detailed: bool },
    /// Generate a cron expression from a natural-language description
    Generate,
}

impl Mode {
    /// Line dialect used to parse this mode's output, if it produces rows at all.
    pub fn dialect(&self) -> Option<Dialect> {
        match self {
            Mode::Explain { detailed: true } => Some(Dialect::DETAILED),
            Mode::Explain { detailed: false } => Some(Dialect::TERSE),
            Mode::Generate => None,
        }
    }

    pub fn system_instruction(&self) -> &'static str {
        match self {
            Mode::Explain { detailed: true } => EXPLAIN_DETAILED_INSTRUCTION,
            Mode::Explain { detailed: false } => EXPLAIN_TERSE_INSTRUCTION,
            Mode::Generate => GENERATE_INSTRUCTION,
        }
    }

    pub fn user_message(&self, input: &str) -> String {
        match self {
            Mode::Explain { .. } => format!("Explain the following cron expression: {input}"),
            Mode::Generate => format!("Generate the following cron expression: {input}"),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Explain { detailed: true } => write!(f, "explain-detailed"),
            Mode::Explain { detailed: false } => write!(f, "explain-terse"),
            Mode::Generate => write!(f, "generate"),
        }
    }
}

/// Build the upstream completion request for `input` in the given mode.
pub fn build_request(mode: Mode, input: &str) -> CompletionRequest {
    CompletionRequest {
        mode,
        system: mode.system_instruction().to_string(),
        user: mode.user_message(input),
        sampling: SamplingParams::default(),
    }
}
