//! Prompt layout shared by every generator.
//!
//! The system half carries the document-analyst guidelines plus any
//! per-call instructions; the user half carries retrieved context and the
//! question itself.

use crate::GenerationRequest;

const BASE_GUIDELINES: &str = "You are an expert assistant specialized in analyzing documents. \
You have access to multimodal content including text, tables, and images extracted from the documents.

Guidelines:
1. Provide accurate, detailed responses based on the provided context
2. If asked about trends or data analysis, provide structured insights
3. Use specific page references when available
4. If information is not in the context, clearly state that
5. For numerical data, be precise and cite sources
6. Organize responses clearly with headers when appropriate";

/// System prompt: base guidelines, then `Additional instructions` when given.
pub fn system_prompt(system_message: &str) -> String {
    let extra = system_message.trim();
    if extra.is_empty() {
        BASE_GUIDELINES.to_string()
    } else {
        format!("{BASE_GUIDELINES}\n\nAdditional instructions: {extra}")
    }
}

/// User prompt: context block (omitted when empty) followed by the question.
pub fn user_prompt(prompt: &str, context: &str) -> String {
    let mut out = String::new();
    let context = context.trim();
    if !context.is_empty() {
        out.push_str("Context from documents:\n");
        out.push_str(context);
        out.push_str("\n\n");
    }
    out.push_str("User Question: ");
    out.push_str(prompt.trim());
    out.push_str(
        "\n\nPlease provide a comprehensive, accurate response based on the context provided.",
    );
    out
}

/// Both halves joined, for generators that take a single prompt string.
pub fn render(request: &GenerationRequest) -> String {
    format!(
        "{}\n\n{}",
        system_prompt(&request.system_message),
        user_prompt(&request.prompt, &request.context)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_appends_additional_instructions() {
        let plain = system_prompt("");
        assert!(!plain.contains("Additional instructions"));

        let extended = system_prompt("  Answer in JSON.  ");
        assert!(extended.starts_with(BASE_GUIDELINES));
        assert!(extended.ends_with("Additional instructions: Answer in JSON."));
    }

    #[test]
    fn user_prompt_omits_empty_context() {
        let p = user_prompt("What grew?", "   ");
        assert!(p.starts_with("User Question: What grew?"));
        assert!(!p.contains("Context from documents"));
    }

    #[test]
    fn user_prompt_places_context_before_question() {
        let p = user_prompt("What grew?", "[Table from Page 2]\nsales: 10");
        let ctx_at = p.find("Context from documents").unwrap();
        let q_at = p.find("User Question").unwrap();
        assert!(ctx_at < q_at);
        assert!(p.contains("sales: 10"));
    }

    #[test]
    fn render_joins_both_halves() {
        let req = GenerationRequest::new("q").with_system_message("be brief");
        let rendered = render(&req);
        assert!(rendered.contains("Additional instructions: be brief"));
        assert!(rendered.contains("User Question: q"));
    }
}
