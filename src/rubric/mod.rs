//! The Hybrid Conversation rubric.
//!
//! Six sequential stages, each scored on a 0-10 scale. [`Stage::ALL`] is the
//! single source of stage order: extraction, aggregation, storage and the
//! radar chart all iterate it, so every view of a score set lists the stages
//! the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest score on the rubric scale.
pub const MIN_SCORE: u8 = 0;
/// Highest score on the rubric scale.
pub const MAX_SCORE: u8 = 10;
/// Score substituted when a stage cannot be read from a narrative.
pub const FALLBACK_SCORE: u8 = 5;

/// One of the six sequential stages of the Hybrid Conversation methodology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Situation and problem questions; establish credibility.
    Warmer,
    /// Validate the problem and introduce a disruptive commercial insight.
    Reframe,
    /// Quantify the cost of the reframed problem with data.
    RationalDrowning,
    /// Make the problem personal; need-payoff questions.
    EmotionalImpact,
    /// Describe the ideal solution without naming a product.
    NewWay,
    /// Connect the new way to the product and book a next step.
    YourSolution,
}

impl Stage {
    /// All stages in methodology order.
    pub const ALL: [Stage; 6] = [
        Stage::Warmer,
        Stage::Reframe,
        Stage::RationalDrowning,
        Stage::EmotionalImpact,
        Stage::NewWay,
        Stage::YourSolution,
    ];

    /// Stable identifier used in storage and serialized output.
    pub fn key(self) -> &'static str {
        match self {
            Stage::Warmer => "warmer",
            Stage::Reframe => "reframe",
            Stage::RationalDrowning => "rational_drowning",
            Stage::EmotionalImpact => "emotional_impact",
            Stage::NewWay => "new_way",
            Stage::YourSolution => "your_solution",
        }
    }

    /// Label the model is asked to print before each score (`<label>: X/10`).
    ///
    /// The label is the same in both prompt languages.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Warmer => "Warmer",
            Stage::Reframe => "Reframe",
            Stage::RationalDrowning => "Rational Drowning",
            Stage::EmotionalImpact => "Emotional Impact",
            Stage::NewWay => "New Way",
            Stage::YourSolution => "Your Solution",
        }
    }

    /// Zero-based position in the methodology.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Rubric text for this stage in the given language.
    pub fn definition(self, language: Language) -> StageDefinition {
        let (translation, focus, objective, key_elements) = match (self, language) {
            (Stage::Warmer, Language::English) => (
                "Warm-up",
                Some("Situation and Problem Questions"),
                "Establish credibility, show research, diagnose known problems",
                "Transparent opening, demonstrate knowledge, engagement question",
            ),
            (Stage::Warmer, Language::Portuguese) => (
                "Aquecimento",
                Some("Perguntas de Situação e Problema"),
                "Estabelecer credibilidade, mostrar pesquisa, diagnosticar problemas conhecidos",
                "Abertura transparente, demonstrar conhecimento, pergunta de engajamento",
            ),
            (Stage::Reframe, Language::English) => (
                "Recontextualization",
                Some("Problem Validation"),
                "Validate prospect response and introduce disruptive commercial insight",
                "Validate and agree, introduce reframing with insight",
            ),
            (Stage::Reframe, Language::Portuguese) => (
                "Reenquadramento",
                Some("Validação do Problema"),
                "Validar resposta do prospect e introduzir insight comercial disruptivo",
                "Validar e concordar, introduzir reenquadramento com insight",
            ),
            (Stage::RationalDrowning, Language::English) => (
                "Rational Drowning",
                Some("Implication Questions"),
                "Use data and logic to quantify cost of reframed problem",
                "Present key data, ask implication question",
            ),
            (Stage::RationalDrowning, Language::Portuguese) => (
                "Afogamento Racional",
                Some("Perguntas de Implicação"),
                "Usar dados e lógica para quantificar custo do problema reenquadrado",
                "Apresentar dado chave, fazer pergunta de implicação",
            ),
            (Stage::EmotionalImpact, Language::English) => (
                "Emotional Impact",
                Some("Need-Payoff Questions"),
                "Make problem personal with story and make prospect articulate benefits",
                "Tell mini-story, ask need-payoff question",
            ),
            (Stage::EmotionalImpact, Language::Portuguese) => (
                "Impacto Emocional",
                Some("Perguntas de Necessidade de Solução"),
                "Tornar problema pessoal com história e fazer prospect articular benefícios",
                "Contar mini-história, fazer pergunta de necessidade de solução",
            ),
            (Stage::NewWay, Language::English) => (
                "New Way",
                None,
                "Introduce ideal solution vision, capabilities needed to solve reframed problem",
                "Present solution vision without mentioning specific product",
            ),
            (Stage::NewWay, Language::Portuguese) => (
                "Novo Caminho",
                None,
                "Introduzir visão da solução ideal, capacidades necessárias para resolver problema reenquadrado",
                "Apresentar visão da solução sem mencionar produto específico",
            ),
            (Stage::YourSolution, Language::English) => (
                "Your Solution",
                None,
                "Connect \"New Way\" directly to your product/service and schedule next step",
                "Make connection, propose next step (call to action)",
            ),
            (Stage::YourSolution, Language::Portuguese) => (
                "Sua Solução",
                None,
                "Conectar \"Novo Caminho\" diretamente ao seu produto/serviço e agendar próximo passo",
                "Fazer conexão, propor próximo passo (call to action)",
            ),
        };

        StageDefinition {
            stage: self,
            translation,
            spin_focus: focus,
            objective,
            key_elements,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.key() == s.trim())
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// Rubric text describing one stage, embedded in the narrative prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    pub stage: Stage,
    /// Localized gloss printed next to the English stage label.
    pub translation: &'static str,
    /// SPIN Selling question type the stage relies on, if any.
    pub spin_focus: Option<&'static str>,
    pub objective: &'static str,
    pub key_elements: &'static str,
}

/// The six stage definitions in methodology order.
pub fn stage_definitions(language: Language) -> [StageDefinition; 6] {
    Stage::ALL.map(|stage| stage.definition(language))
}

/// Language spoken in the recorded call; selects the prompt template family
/// and the section headers the extractor looks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "pt", alias = "portuguese")]
    Portuguese,
    #[default]
    #[serde(rename = "en", alias = "english")]
    English,
}

impl Language {
    /// Short language code.
    pub fn code(self) -> &'static str {
        match self {
            Language::Portuguese => "pt",
            Language::English => "en",
        }
    }

    /// Name of the language written in that language.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::Portuguese => "Português",
            Language::English => "English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pt" | "pt-br" | "portuguese" | "português" | "portugues" => Ok(Language::Portuguese),
            "en" | "en-us" | "english" => Ok(Language::English),
            _ => Err(format!("Unknown language: {}", s)),
        }
    }
}

/// The six bounded scores of one analyzed call.
///
/// Values are always within `MIN_SCORE..=MAX_SCORE`; [`RubricScoreSet::set`]
/// replaces anything out of range with [`FALLBACK_SCORE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricScoreSet {
    pub warmer: u8,
    pub reframe: u8,
    pub rational_drowning: u8,
    pub emotional_impact: u8,
    pub new_way: u8,
    pub your_solution: u8,
}

impl RubricScoreSet {
    /// Score set with the same value in every stage (clamped to the scale).
    pub fn uniform(value: u8) -> Self {
        let value = value.min(MAX_SCORE);
        Self {
            warmer: value,
            reframe: value,
            rational_drowning: value,
            emotional_impact: value,
            new_way: value,
            your_solution: value,
        }
    }

    /// Score set with every stage at the fallback value.
    pub fn fallback() -> Self {
        Self::uniform(FALLBACK_SCORE)
    }

    /// Build from six values in [`Stage::ALL`] order.
    pub fn from_array(values: [u8; 6]) -> Self {
        let mut set = Self::fallback();
        for (stage, value) in Stage::ALL.into_iter().zip(values) {
            set.set(stage, value);
        }
        set
    }

    /// Score for a stage.
    pub fn get(&self, stage: Stage) -> u8 {
        match stage {
            Stage::Warmer => self.warmer,
            Stage::Reframe => self.reframe,
            Stage::RationalDrowning => self.rational_drowning,
            Stage::EmotionalImpact => self.emotional_impact,
            Stage::NewWay => self.new_way,
            Stage::YourSolution => self.your_solution,
        }
    }

    /// Set a stage score. Values above the scale become [`FALLBACK_SCORE`].
    pub fn set(&mut self, stage: Stage, value: u8) {
        let value = if is_valid_score(i64::from(value)) {
            value
        } else {
            FALLBACK_SCORE
        };
        let slot = match stage {
            Stage::Warmer => &mut self.warmer,
            Stage::Reframe => &mut self.reframe,
            Stage::RationalDrowning => &mut self.rational_drowning,
            Stage::EmotionalImpact => &mut self.emotional_impact,
            Stage::NewWay => &mut self.new_way,
            Stage::YourSolution => &mut self.your_solution,
        };
        *slot = value;
    }

    /// `(stage, score)` pairs in methodology order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, u8)> + '_ {
        Stage::ALL.into_iter().map(move |stage| (stage, self.get(stage)))
    }

    /// Scores in methodology order.
    pub fn to_array(&self) -> [u8; 6] {
        Stage::ALL.map(|stage| self.get(stage))
    }
}

impl Default for RubricScoreSet {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Whether a raw integer lies on the rubric scale.
pub fn is_valid_score(value: i64) -> bool {
    (i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&value)
}

/// Display band for a single stage score, matching the traffic-light
/// coloring used when a fresh analysis is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageBand {
    /// 8 and above.
    Strong,
    /// 6 and 7.
    Attention,
    /// Below 6.
    Weak,
}

impl StageBand {
    /// Band for a stage score.
    pub fn for_score(score: u8) -> Self {
        if score >= 8 {
            StageBand::Strong
        } else if score >= 6 {
            StageBand::Attention
        } else {
            StageBand::Weak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed() {
        let keys: Vec<&str> = Stage::ALL.iter().map(|s| s.key()).collect();
        assert_eq!(
            keys,
            vec![
                "warmer",
                "reframe",
                "rational_drowning",
                "emotional_impact",
                "new_way",
                "your_solution"
            ]
        );
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("new_way".parse::<Stage>().unwrap(), Stage::NewWay);
        assert!("closing".parse::<Stage>().is_err());
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("Português".parse::<Language>().unwrap(), Language::Portuguese);
        assert_eq!("PT".parse::<Language>().unwrap(), Language::Portuguese);
        assert_eq!("english".parse::<Language>().unwrap(), Language::English);
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::default(), Language::English);
    }

    #[test]
    fn test_language_serde() {
        let json = serde_json::to_string(&Language::Portuguese).unwrap();
        assert_eq!(json, "\"pt\"");
        let lang: Language = serde_json::from_str("\"english\"").unwrap();
        assert_eq!(lang, Language::English);
    }

    #[test]
    fn test_score_set_get_set() {
        let mut set = RubricScoreSet::fallback();
        set.set(Stage::Reframe, 9);
        assert_eq!(set.get(Stage::Reframe), 9);
        assert_eq!(set.get(Stage::Warmer), FALLBACK_SCORE);

        set.set(Stage::Warmer, 11);
        assert_eq!(set.get(Stage::Warmer), FALLBACK_SCORE);
    }

    #[test]
    fn test_score_set_array_round_order() {
        let set = RubricScoreSet::from_array([1, 2, 3, 4, 5, 6]);
        assert_eq!(set.warmer, 1);
        assert_eq!(set.your_solution, 6);
        assert_eq!(set.to_array(), [1, 2, 3, 4, 5, 6]);

        let stages: Vec<Stage> = set.iter().map(|(s, _)| s).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
    }

    #[test]
    fn test_uniform_clamps() {
        assert_eq!(RubricScoreSet::uniform(42).to_array(), [10; 6]);
    }

    #[test]
    fn test_definitions_cover_all_stages() {
        for language in [Language::English, Language::Portuguese] {
            let defs = stage_definitions(language);
            for (def, stage) in defs.iter().zip(Stage::ALL) {
                assert_eq!(def.stage, stage);
                assert!(!def.objective.is_empty());
            }
            assert!(defs[0].spin_focus.is_some());
            assert!(defs[5].spin_focus.is_none());
        }
        assert_eq!(
            Stage::RationalDrowning.definition(Language::Portuguese).translation,
            "Afogamento Racional"
        );
    }

    #[test]
    fn test_stage_band() {
        assert_eq!(StageBand::for_score(10), StageBand::Strong);
        assert_eq!(StageBand::for_score(8), StageBand::Strong);
        assert_eq!(StageBand::for_score(7), StageBand::Attention);
        assert_eq!(StageBand::for_score(6), StageBand::Attention);
        assert_eq!(StageBand::for_score(5), StageBand::Weak);
        assert_eq!(StageBand::for_score(0), StageBand::Weak);
    }

    #[test]
    fn test_is_valid_score() {
        assert!(is_valid_score(0));
        assert!(is_valid_score(10));
        assert!(!is_valid_score(-1));
        assert!(!is_valid_score(11));
    }
}
