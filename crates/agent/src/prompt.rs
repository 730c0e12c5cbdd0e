//! Prompt assembly.
//!
//! Pure string composition: given the same instructions, context,
//! history and query, the output is byte-identical. All I/O stays in the
//! caller.

use potager_core::message::HistoryMessage;
use potager_core::tool::ToolSchema;
use std::fmt::Write;

/// Built-in system instructions, used when the configuration does not
/// override them.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
Tu es le Chef de Culture, expert en jardinage, rustique, précis et serviable.
Tu gères le jardin via des outils précis.
1. Utilise `search_garden` ou `list_my_subjects` pour comprendre le contexte avant d'agir.
2. Pour créer une culture, il faut un nom, une quantité et une unité valide.
3. Note scrupuleusement les événements au journal.
4. IMPORTANT : avant de créer quoi que ce soit, VÉRIFIE que la plante existe dans le référentiel botanique avec `search_garden`. Si tu ne trouves pas la variété exacte, DEMANDE à l'utilisateur de préciser. Ne crée jamais de sujet sur une plante inconnue ou ambigüe.
5. Avant de répondre, pense étape par étape à la solution.
6. Sois concis.";

const CONFIRMATION_GATE: &str = "\
RÈGLE DE CONFIRMATION : avant toute action qui modifie le jardin \
(création de sujet, événement au journal), reformule d'abord l'action \
prévue en langage naturel et attends la confirmation explicite de \
l'utilisateur. N'émets le bloc d'outil qu'après cette confirmation.";

/// Composes the full prompt for one request. One instance per
/// configuration; `assemble` itself is deterministic and side-effect
/// free.
pub struct PromptAssembler {
    base_instructions: String,
    safety_enabled: bool,
    thought_marker: String,
    answer_marker: String,
}

impl PromptAssembler {
    pub fn new(
        base_instructions: impl Into<String>,
        safety_enabled: bool,
        thought_marker: impl Into<String>,
        answer_marker: impl Into<String>,
    ) -> Self {
        Self {
            base_instructions: base_instructions.into(),
            safety_enabled,
            thought_marker: thought_marker.into(),
            answer_marker: answer_marker.into(),
        }
    }

    /// Base instructions, dynamic context, optional confirmation gate,
    /// history, query, then the output-contract reminder — in that order.
    pub fn assemble(
        &self,
        context: &str,
        history: &[HistoryMessage],
        query: &str,
        tools: &[ToolSchema],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.base_instructions);
        prompt.push_str("\n\n");

        if !context.trim().is_empty() {
            let _ = writeln!(prompt, "[CONTEXTE DU JARDIN]\n{context}\n[/CONTEXTE DU JARDIN]\n");
        }

        if self.safety_enabled {
            prompt.push_str(CONFIRMATION_GATE);
            prompt.push_str("\n\n");
        }

        if !history.is_empty() {
            prompt.push_str("[HISTORIQUE DE CONVERSATION]\n");
            for msg in history {
                let _ = writeln!(prompt, "{}: {}", msg.role.to_uppercase(), msg.content);
            }
            prompt.push_str("[/HISTORIQUE DE CONVERSATION]\n\n");
        }

        let _ = writeln!(prompt, "USER_QUERY: {query}");
        prompt.push('\n');
        prompt.push_str(&self.output_contract(tools));
        prompt
    }

    /// The reminder telling the model how to format its reply and how a
    /// tool call must be textually delimited.
    fn output_contract(&self, tools: &[ToolSchema]) -> String {
        let mut note = String::from("NOTE IMPORTANTE :\n");
        let _ = writeln!(
            note,
            "- Commence ton raisonnement interne par `{} :` puis introduis ta réponse visible par `{} :`.",
            self.thought_marker, self.answer_marker
        );
        note.push_str(
            "- Si tu décides d'effectuer une action, génère exactement un bloc JSON comme ci-dessous (un seul outil par tour).\n\
             - Sinon, réponds simplement en texte naturel.\n\n",
        );
        note.push_str("Outils disponibles :\n");
        for tool in tools {
            let _ = writeln!(note, "- `{}` : {}", tool.name, tool.description);
        }
        note.push_str(
            "\n```json\n{\n  \"tool\": \"nom_de_l_outil\",\n  \"args\": { ... }\n}\n```\n",
        );
        note
    }
}

/// The block appended to the transcript after a tool ran, asking the
/// model for its next step.
pub fn continuation_block(tool: &str, args: &serde_json::Value, result_json: &str) -> String {
    format!(
        "\n\nASSISTANT (TOI): J'utilise l'outil {tool} avec {args}\n\n\
         RÉSULTAT DE L'OUTIL:\n{result_json}\n\n\
         INSTRUCTION:\n\
         Grâce à ces informations:\n\
         1. Si c'était une recherche/lecture, formule une réponse naturelle pour l'utilisateur.\n\
         2. Si c'était une action (création/journal), confirme simplement le succès.\n\
         3. Si une suite est nécessaire (ex: après recherche -> création), génère le prochain appel d'outil.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schemas() -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "search_garden".into(),
            description: "Recherche dans le jardin".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]
    }

    fn assembler(safety: bool) -> PromptAssembler {
        PromptAssembler::new(DEFAULT_SYSTEM_PROMPT, safety, "PENSÉE", "RÉPONSE")
    }

    #[test]
    fn sections_appear_in_order() {
        let history = vec![
            HistoryMessage {
                role: "user".into(),
                content: "Bonjour".into(),
            },
            HistoryMessage {
                role: "assistant".into(),
                content: "Bonjour !".into(),
            },
        ];
        let prompt = assembler(false).assemble(
            "Saison 2026 active",
            &history,
            "Combien de tomates ?",
            &schemas(),
        );

        let context_at = prompt.find("[CONTEXTE DU JARDIN]").unwrap();
        let history_at = prompt.find("[HISTORIQUE DE CONVERSATION]").unwrap();
        let query_at = prompt.find("USER_QUERY: Combien de tomates ?").unwrap();
        let note_at = prompt.find("NOTE IMPORTANTE").unwrap();
        assert!(context_at < history_at);
        assert!(history_at < query_at);
        assert!(query_at < note_at);
        assert!(prompt.contains("USER: Bonjour"));
        assert!(prompt.contains("ASSISTANT: Bonjour !"));
        assert!(prompt.contains("`search_garden` : Recherche dans le jardin"));
    }

    #[test]
    fn confirmation_gate_only_when_enabled() {
        let without = assembler(false).assemble("", &[], "test", &schemas());
        let with = assembler(true).assemble("", &[], "test", &schemas());
        assert!(!without.contains("RÈGLE DE CONFIRMATION"));
        assert!(with.contains("RÈGLE DE CONFIRMATION"));
    }

    #[test]
    fn empty_context_emits_no_context_block() {
        let prompt = assembler(false).assemble("  ", &[], "test", &schemas());
        assert!(!prompt.contains("[CONTEXTE DU JARDIN]"));
    }

    #[test]
    fn deterministic() {
        let a = assembler(false).assemble("ctx", &[], "q", &schemas());
        let b = assembler(false).assemble("ctx", &[], "q", &schemas());
        assert_eq!(a, b);
    }

    #[test]
    fn continuation_block_carries_result_and_instruction() {
        let block = continuation_block(
            "search_garden",
            &serde_json::json!({"query": "tomate"}),
            "{\"count\":1}",
        );
        assert!(block.contains("J'utilise l'outil search_garden"));
        assert!(block.contains("RÉSULTAT DE L'OUTIL:\n{\"count\":1}"));
        assert!(block.contains("INSTRUCTION:"));
    }
}
