//! Prompt templates sent to the text-generation service.
//!
//! The section headers in [`SectionHeaders`] are a contract with
//! [`crate::extraction`]: the extractor finds sections by these exact strings
//! (case-insensitive), so the templates and the extractor must always read
//! them from here.

use serde::{Deserialize, Serialize};

use crate::rubric::{stage_definitions, Language, StageDefinition};

/// Marker that opens every section of a generated narrative.
pub const SECTION_MARKER: &str = "###";

/// Literal section headers for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeaders {
    pub scores: &'static str,
    pub detailed_analysis: &'static str,
    pub insight_evaluation: &'static str,
    pub attention_points: &'static str,
    pub recommendations: &'static str,
    pub meeting_summary: &'static str,
    pub meeting_goals: &'static str,
}

impl SectionHeaders {
    /// Headers used by templates and extractor for `language`.
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self {
                scores: "HYBRID CONVERSATION SCORES",
                detailed_analysis: "DETAILED ANALYSIS",
                insight_evaluation: "COMMERCIAL INSIGHT EVALUATION",
                attention_points: "ATTENTION POINTS",
                recommendations: "RECOMMENDATIONS",
                meeting_summary: "MEETING SUMMARY",
                meeting_goals: "GOALS AND NEXT STEPS",
            },
            Language::Portuguese => Self {
                scores: "SCORES CONVERSA HÍBRIDA",
                detailed_analysis: "ANÁLISE DETALHADA",
                insight_evaluation: "AVALIAÇÃO DO INSIGHT COMERCIAL",
                attention_points: "PONTOS DE ATENÇÃO",
                recommendations: "RECOMENDAÇÕES",
                meeting_summary: "RESUMO DA REUNIÃO",
                meeting_goals: "METAS E PRÓXIMOS PASSOS",
            },
        }
    }
}

/// Caller-supplied facts about the recorded call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub bdr_name: String,
    pub prospect_name: String,
    pub prospect_company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial_insight: Option<String>,
}

impl CallMetadata {
    /// Commercial insight text, or the language's "not specified" sentinel
    /// when the field is absent or blank.
    pub fn insight_or_sentinel(&self, language: Language) -> &str {
        match self.commercial_insight.as_deref() {
            Some(insight) if !insight.trim().is_empty() => insight,
            _ => not_specified(language),
        }
    }
}

/// Sentinel substituted for an absent commercial insight.
pub fn not_specified(language: Language) -> &'static str {
    match language {
        Language::English => "Not specified",
        Language::Portuguese => "Não especificado",
    }
}

/// Fixed prose of one template family.
struct Template {
    role: &'static str,
    task: &'static str,
    methodology_title: &'static str,
    methodology: &'static str,
    steps_title: &'static str,
    focus_label: &'static str,
    objective_label: &'static str,
    elements_label: &'static str,
    info_title: &'static str,
    company_label: &'static str,
    language_label: &'static str,
    insight_label: &'static str,
    transcript_title: &'static str,
    request_title: &'static str,
    request: &'static str,
    detailed_hint: &'static str,
    insight_hint: &'static str,
    attention_hint: &'static str,
    recommendations_hint: &'static str,
    closing: &'static str,
}

fn template(language: Language) -> Template {
    match language {
        Language::English => Template {
            role: "You are a sales expert and certified coach in the Hybrid Conversation methodology.",
            task: "Analyze this cold call transcription based on the HYBRID CONVERSATION methodology (6 steps):",
            methodology_title: "HYBRID CONVERSATION METHODOLOGY:",
            methodology: "This approach combines SPIN Selling and The Challenger Sale in 6 sequential steps for maximum effectiveness in complex B2B sales.",
            steps_title: "THE 6 STEPS:",
            focus_label: "SPIN Focus",
            objective_label: "Objective",
            elements_label: "Key Elements",
            info_title: "CALL INFORMATION:",
            company_label: "Company",
            language_label: "Language",
            insight_label: "Commercial Insight Used",
            transcript_title: "TRANSCRIPTION:",
            request_title: "REQUESTED ANALYSIS:",
            request: "Evaluate each step from 0 to 10 and provide:",
            detailed_hint: "(Complete call analysis based on the 6-step hybrid conversation methodology)",
            insight_hint: "(How well was the commercial insight used and developed?)",
            attention_hint: "(Specific areas that need improvement based on the 6 steps)",
            recommendations_hint: "(Specific actions to improve each step)",
            closing: "IMPORTANT: Be rigorous in evaluation. High scores (8-10) should be reserved for exemplary execution of each step.",
        },
        Language::Portuguese => Template {
            role: "Você é um especialista em vendas e coach certificado na metodologia Conversa Híbrida.",
            task: "Analise esta transcrição de cold call baseado na metodologia CONVERSA HÍBRIDA (6 etapas):",
            methodology_title: "METODOLOGIA CONVERSA HÍBRIDA:",
            methodology: "Esta abordagem combina SPIN Selling e The Challenger Sale em 6 etapas sequenciais para máxima eficácia em vendas B2B complexas.",
            steps_title: "AS 6 ETAPAS:",
            focus_label: "Foco SPIN",
            objective_label: "Objetivo",
            elements_label: "Elementos-chave",
            info_title: "INFORMAÇÕES DA LIGAÇÃO:",
            company_label: "Empresa",
            language_label: "Idioma",
            insight_label: "Insight Comercial Utilizado",
            transcript_title: "TRANSCRIÇÃO:",
            request_title: "ANÁLISE SOLICITADA:",
            request: "Avalie cada etapa de 0 a 10 e forneça:",
            detailed_hint: "(Análise completa da ligação baseada na metodologia de 6 etapas da conversa híbrida)",
            insight_hint: "(Quão bem o insight comercial foi usado e desenvolvido?)",
            attention_hint: "(Áreas específicas que precisam de melhoria baseadas nas 6 etapas)",
            recommendations_hint: "(Ações específicas para melhorar cada etapa)",
            closing: "IMPORTANTE: Seja rigoroso na avaliação. Scores altos (8-10) devem ser reservados para execução exemplar de cada etapa.",
        },
    }
}

/// Build the cold-call analysis prompt.
///
/// Pure: the same inputs always produce the same text. Metadata and the
/// transcript are substituted verbatim.
pub fn build_prompt(
    language: Language,
    stages: &[StageDefinition],
    metadata: &CallMetadata,
    transcript: &str,
) -> String {
    let t = template(language);
    let headers = SectionHeaders::for_language(language);
    let mut prompt = String::new();

    prompt.push_str(&format!("{}\n\n{}\n\n", t.role, t.task));
    prompt.push_str(&format!(
        "**{}**\n{}\n\n**{}**\n\n",
        t.methodology_title, t.methodology, t.steps_title
    ));

    for (position, def) in stages.iter().enumerate() {
        prompt.push_str(&format!(
            "**{}. {} ({})**\n",
            position + 1,
            def.stage.label(),
            def.translation
        ));
        if let Some(focus) = def.spin_focus {
            prompt.push_str(&format!("- {}: {}\n", t.focus_label, focus));
        }
        prompt.push_str(&format!("- {}: {}\n", t.objective_label, def.objective));
        prompt.push_str(&format!("- {}: {}\n\n", t.elements_label, def.key_elements));
    }

    prompt.push_str(&format!("**{}**\n", t.info_title));
    prompt.push_str(&format!("- BDR: {}\n", metadata.bdr_name));
    prompt.push_str(&format!("- Prospect: {}\n", metadata.prospect_name));
    prompt.push_str(&format!(
        "- {}: {}\n",
        t.company_label, metadata.prospect_company
    ));
    prompt.push_str(&format!(
        "- {}: {}\n",
        t.language_label,
        language.native_name()
    ));
    prompt.push_str(&format!(
        "- {}: {}\n\n",
        t.insight_label,
        metadata.insight_or_sentinel(language)
    ));

    prompt.push_str(&format!("**{}**\n{}\n\n", t.transcript_title, transcript));

    prompt.push_str(&format!("**{}**\n\n{}\n\n", t.request_title, t.request));
    prompt.push_str(&format!("{} {}\n", SECTION_MARKER, headers.scores));
    for def in stages {
        prompt.push_str(&format!("**{}:** X/10\n", def.stage.label()));
    }
    prompt.push('\n');

    for (header, hint) in [
        (headers.detailed_analysis, t.detailed_hint),
        (headers.insight_evaluation, t.insight_hint),
        (headers.attention_points, t.attention_hint),
        (headers.recommendations, t.recommendations_hint),
    ] {
        prompt.push_str(&format!("{} {}\n{}\n\n", SECTION_MARKER, header, hint));
    }

    prompt.push_str(t.closing);
    prompt.push('\n');
    prompt
}

/// Build the cold-call prompt with the standard six-stage rubric.
pub fn build_cold_call_prompt(
    language: Language,
    metadata: &CallMetadata,
    transcript: &str,
) -> String {
    build_prompt(language, &stage_definitions(language), metadata, transcript)
}

/// Build the 1:1 meeting analysis prompt.
pub fn build_meeting_prompt(language: Language, bdr_name: &str, transcript: &str) -> String {
    let headers = SectionHeaders::for_language(language);
    let (intro, summary_hint, goals_hint) = match language {
        Language::English => (
            format!(
                "You are an expert in managing sales development teams (BDRs) and in the Hybrid Conversation methodology.\n\
                 Analyze this weekly 1:1 meeting between a manager and the BDR {}, focusing on professional development, performance and growth.",
                bdr_name
            ),
            "(Executive summary of the main points discussed)",
            "(Specific SMART goals and next steps for the coming week)",
        ),
        Language::Portuguese => (
            format!(
                "Você é um especialista em gestão de equipes de vendas (BDRs) e na metodologia Conversa Híbrida.\n\
                 Analise esta reunião 1:1 semanal entre gestor e o BDR {}, focando em desenvolvimento profissional, performance e crescimento.",
                bdr_name
            ),
            "(Resumo executivo dos principais pontos discutidos)",
            "(Metas SMART específicas e próximos passos para a próxima semana)",
        ),
    };
    let transcript_title = match language {
        Language::English => "TRANSCRIPTION:",
        Language::Portuguese => "TRANSCRIÇÃO:",
    };

    format!(
        "{intro}\n\n**{transcript_title}**\n\"\"\"\n{transcript}\n\"\"\"\n\n\
         {marker} {summary}\n{summary_hint}\n\n\
         {marker} {goals}\n{goals_hint}\n",
        intro = intro,
        transcript_title = transcript_title,
        transcript = transcript,
        marker = SECTION_MARKER,
        summary = headers.meeting_summary,
        summary_hint = summary_hint,
        goals = headers.meeting_goals,
        goals_hint = goals_hint,
    )
}
