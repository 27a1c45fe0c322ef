/// A fixed instruction with `{name}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub body: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, body: &'static str) -> Self {
        Self { name, body }
    }

    /// Substitutes each `{key}` in a single left-to-right pass. Placeholders
    /// without a value are kept verbatim, and substituted text is never
    /// scanned again.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut output = String::with_capacity(self.body.len());
        let mut rest = self.body;

        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                output.push_str(&rest[open..]);
                return output;
            };

            let key = &after[..close];
            match lookup(values, key) {
                Some(value) => output.push_str(value),
                None => {
                    output.push('{');
                    output.push_str(key);
                    output.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        output.push_str(rest);
        output
    }
}

fn lookup<'a>(values: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

pub const CHUNK_SUMMARY: PromptTemplate = PromptTemplate::new(
    "chunk_summary",
    "The user searched for: '{query}'.\n\
     Summarize the following text, keeping ALL important facts relevant to that search.\n\
     Make it concise but do not lose critical information.\n\
     \n\
     TEXT:\n\
     {chunk}\n",
);

pub const MERGE_SUMMARY: PromptTemplate = PromptTemplate::new(
    "merge_summary",
    "The user searched for: '{query}'.\n\
     Here are multiple summaries from different chunks.\n\
     Merge them into one clear, complete and non-redundant summary.\n\
     \n\
     CHUNK SUMMARIES:\n\
     {summaries}\n",
);

pub const QA_PAIRS: PromptTemplate = PromptTemplate::new(
    "qa_pairs",
    "You are an AI tutor. Generate 3 high-quality question-answer pairs\n\
     based on the following text. Each pair should be concise and clear.\n\
     \n\
     Text:\n\
     {text}\n\
     \n\
     Format strictly as a JSON list of objects:\n\
     [\n  {\"question\": \"Question1\", \"answer\": \"Answer1\"},\n  \
     {\"question\": \"Question2\", \"answer\": \"Answer2\"},\n  \
     {\"question\": \"Question3\", \"answer\": \"Answer3\"}\n]\n",
);
