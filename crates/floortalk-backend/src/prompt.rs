use crate::wire::{Content, GenerateRequest, GenerationConfig};
use floortalk_core::{LanguageTag, TranslationRequest};

const JSON_MIME: &str = "application/json";

fn generation_config(temperature: f32) -> GenerationConfig {
    GenerationConfig {
        temperature,
        response_mime_type: JSON_MIME.to_string(),
    }
}

/// System instruction for the initial call: interpreter role, the two strict
/// output shapes, and the ambiguity heuristics that bias the model toward
/// asking instead of guessing.
fn system_instruction(from: LanguageTag, to: LanguageTag) -> String {
    format!(
        concat!(
            "You are an interpreter on a factory floor, translating short spoken ",
            "instructions between a supervisor and a worker. The input is {from}; ",
            "the output language is {to}.\n\n",
            "Respond with strict JSON only, matching exactly one of these shapes:\n",
            "{{\"type\":\"translate\",\"original\":string,\"translated\":string,\"note\"?:string}}\n",
            "{{\"type\":\"clarify\",\"question_source\":string,\"question_target\":string,",
            "\"options\":[{{\"source\":string,\"target\":string,\"value\":string}},...]}}\n\n",
            "Use the translate shape when the instruction is unambiguous; put the ",
            "input text verbatim in \"original\" and add \"note\" only when the worker ",
            "needs extra context (tone, safety, urgency).\n",
            "Use the clarify shape when the instruction is ambiguous: vague pronouns ",
            "(\"that thing\", \"it\"), unspecified actions (\"deal with\", \"handle\"), or a ",
            "missing object or location. Offer two to four concrete interpretations; ",
            "each option's \"value\" is the fully disambiguated {from} instruction, with ",
            "\"source\" and \"target\" as short labels in {from} and {to}. When in doubt, ",
            "ask rather than guess."
        ),
        from = from.display_name(),
        to = to.display_name(),
    )
}

/// Inline instruction for the clarified call. No system field; never asks a
/// follow-up question.
fn clarified_instruction(resolved_value: &str, from: LanguageTag, to: LanguageTag) -> String {
    format!(
        concat!(
            "Translate this {from} factory-floor instruction into {to}. It has ",
            "already been disambiguated, so do not ask any further questions. ",
            "Respond with strict JSON only: ",
            "{{\"type\":\"translate\",\"original\":string,\"translated\":string,\"note\"?:string}}\n\n",
            "Instruction: {value}"
        ),
        from = from.display_name(),
        to = to.display_name(),
        value = resolved_value,
    )
}

pub fn initial_request(request: &TranslationRequest, temperature: f32) -> GenerateRequest {
    GenerateRequest {
        system_instruction: Some(Content::text(system_instruction(request.from, request.to))),
        contents: vec![Content::text(request.source_text.clone())],
        generation_config: generation_config(temperature),
    }
}

pub fn clarified_request(
    resolved_value: &str,
    from: LanguageTag,
    to: LanguageTag,
    temperature: f32,
) -> GenerateRequest {
    GenerateRequest {
        system_instruction: None,
        contents: vec![Content::text(clarified_instruction(resolved_value, from, to))],
        generation_config: generation_config(temperature),
    }
}
