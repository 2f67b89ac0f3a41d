// Prompt construction, biased by provider learnings and figure matches.

use showreel_memory::PrioritizedLearning;
use showreel_types::{Brief, Scene};

use crate::figures::FigureMatch;

/// How many learnings feed the prompt prologue.
const MAX_LEARNINGS: usize = 6;

pub struct PromptBuilder<'a> {
    brief: &'a Brief,
    learnings: &'a [PrioritizedLearning],
}

impl<'a> PromptBuilder<'a> {
    pub fn new(brief: &'a Brief, learnings: &'a [PrioritizedLearning]) -> Self {
        Self { brief, learnings }
    }

    /// Video generation prompt: learnings prologue, figure hint, then the
    /// scene itself.
    pub fn video_prompt(&self, scene: &Scene, figure: Option<&FigureMatch>) -> String {
        let mut parts = Vec::new();

        let prologue = self.learnings_prologue();
        if !prologue.is_empty() {
            parts.push(prologue);
        }
        if let Some(figure) = figure {
            parts.push(format!("Inspired by paper figure: {}.", figure.caption));
        }

        parts.push(scene.description.clone());
        if !scene.visual_elements.is_empty() {
            parts.push(format!("Key elements: {}.", scene.visual_elements.join(", ")));
        }
        parts.push(format!(
            "Style: clean, professional, {} aspect.",
            self.brief.aspect_ratio
        ));

        parts.join(" ")
    }

    /// Strengths / weaknesses / best-pattern prologue distilled from the
    /// highest-priority learnings.
    fn learnings_prologue(&self) -> String {
        let mut guidance = Vec::new();
        for learning in self.learnings.iter().take(MAX_LEARNINGS) {
            let content = &learning.record.content;
            for key in ["pattern", "strength", "tip"] {
                if let Some(text) = content.get(key).and_then(|v| v.as_str()) {
                    guidance.push(text.to_string());
                }
            }
            if let Some(avoid) = content.get("avoid").and_then(|v| v.as_str()) {
                guidance.push(format!("Avoid: {avoid}"));
            }
        }

        if guidance.is_empty() {
            String::new()
        } else {
            format!("({})", guidance.join(". "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use showreel_memory::{LearningRecord, NamespaceLevel};

    fn learning(content: serde_json::Value) -> PrioritizedLearning {
        PrioritizedLearning {
            record: LearningRecord::new("/platform/learnings/provider/luma", content),
            namespace: "/platform/learnings/provider/luma".into(),
            level: NamespaceLevel::Platform,
            priority: 0.95,
        }
    }

    #[test]
    fn learnings_bias_the_prologue() {
        let brief = Brief::new("Product demo", 30.0, 10.0);
        let learnings = vec![
            learning(json!({"pattern": "Use concrete nouns"})),
            learning(json!({"avoid": "crowd scenes"})),
        ];
        let builder = PromptBuilder::new(&brief, &learnings);

        let mut scene = Scene::new(0, "intro", 5.0);
        scene.description = "Opening shot of the product".into();
        let prompt = builder.video_prompt(&scene, None);

        assert!(prompt.starts_with("(Use concrete nouns. Avoid: crowd scenes)"));
        assert!(prompt.contains("Opening shot of the product"));
    }

    #[test]
    fn figure_hint_lands_before_the_scene() {
        let brief = Brief::new("Paper explainer", 30.0, 10.0);
        let builder = PromptBuilder::new(&brief, &[]);

        let mut scene = Scene::new(1, "architecture", 5.0);
        scene.description = "The system architecture".into();
        let figure = FigureMatch {
            atom_id: "fig-1".into(),
            caption: "Transformer block diagram".into(),
            image_url: None,
            matched_terms: 3,
        };
        let prompt = builder.video_prompt(&scene, Some(&figure));

        let figure_pos = prompt.find("Transformer block diagram").unwrap();
        let scene_pos = prompt.find("The system architecture").unwrap();
        assert!(figure_pos < scene_pos);
    }

    #[test]
    fn bare_prompt_has_no_empty_prologue() {
        let brief = Brief::new("Logo reveal", 5.0, 2.0);
        let builder = PromptBuilder::new(&brief, &[]);
        let mut scene = Scene::new(0, "logo", 5.0);
        scene.description = "Logo reveal on dark background".into();
        let prompt = builder.video_prompt(&scene, None);
        assert!(!prompt.starts_with('('));
    }
}
