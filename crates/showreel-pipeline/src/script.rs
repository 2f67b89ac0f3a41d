// Script planning: turn a brief into a contiguous scene list for a pilot.

use async_trait::async_trait;

use showreel_types::{Brief, Pilot, ProductionResult, Scene};

/// Target length of a single scene before clamping to the tier's
/// recommended scene count.
const PREFERRED_SCENE_SECONDS: f64 = 8.0;

#[async_trait]
pub trait ScriptPlanner: Send + Sync {
    async fn plan_scenes(&self, brief: &Brief, pilot: &Pilot) -> ProductionResult<Vec<Scene>>;
}

/// Deterministic planner: divides the brief's duration into evenly sized
/// scenes, titled from the concept, with narration when the audio tier
/// calls for a voiceover.
pub struct HeuristicScriptPlanner;

impl HeuristicScriptPlanner {
    fn scene_count(brief: &Brief, pilot: &Pilot) -> u32 {
        let ideal = (brief.target_duration_sec / PREFERRED_SCENE_SECONDS).round() as u32;
        ideal.clamp(1, pilot.target_scenes.max(1))
    }

    fn keywords(concept: &str) -> Vec<String> {
        concept
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .take(5)
            .map(|w| w.to_lowercase())
            .collect()
    }
}

#[async_trait]
impl ScriptPlanner for HeuristicScriptPlanner {
    async fn plan_scenes(&self, brief: &Brief, pilot: &Pilot) -> ProductionResult<Vec<Scene>> {
        let count = Self::scene_count(brief, pilot);
        let per_scene = brief.target_duration_sec / count as f64;
        let keywords = Self::keywords(&brief.concept);

        let beats = ["opening", "development", "detail", "highlight", "closing"];
        let mut scenes = Vec::with_capacity(count as usize);
        for ordinal in 0..count {
            let beat = if count == 1 {
                "complete"
            } else if ordinal == 0 {
                beats[0]
            } else if ordinal == count - 1 {
                beats[4]
            } else {
                beats[1 + (ordinal as usize - 1) % 3]
            };

            let mut scene = Scene::new(ordinal, format!("{} - {beat}", brief.concept), per_scene);
            scene.description = format!(
                "{} shot of: {}. Scene {} of {}.",
                capitalize(beat),
                brief.concept,
                ordinal + 1,
                count
            );
            scene.visual_elements = keywords.clone();
            if brief.audio_tier.wants_voiceover() {
                scene.voiceover_text = Some(narration_for(&brief.concept, beat, ordinal, count));
            }
            scenes.push(scene);
        }
        Ok(scenes)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn narration_for(concept: &str, beat: &str, ordinal: u32, count: u32) -> String {
    if count == 1 {
        return format!("Here it is: {concept}.");
    }
    match beat {
        "opening" => format!("Introducing {concept}."),
        "closing" => format!("That was {concept}. Thanks for watching."),
        _ => format!("Part {} - a closer look at {concept}.", ordinal + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showreel_types::{AudioTier, ProductionTier};

    fn brief(duration: f64) -> Brief {
        Brief::new("Logo reveal", duration, 2.0)
    }

    #[tokio::test]
    async fn short_brief_yields_a_single_scene() {
        let planner = HeuristicScriptPlanner;
        let pilot = Pilot::new(ProductionTier::Static, 1.0);
        let scenes = planner.plan_scenes(&brief(5.0), &pilot).await.unwrap();

        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].scene_id, "scene_000");
        assert_eq!(scenes[0].target_duration_sec, 5.0);
    }

    #[tokio::test]
    async fn ordinals_are_contiguous_and_durations_sum_to_target() {
        let planner = HeuristicScriptPlanner;
        let pilot = Pilot::new(ProductionTier::Animated, 1.0);
        let scenes = planner.plan_scenes(&brief(30.0), &pilot).await.unwrap();

        assert!(showreel_types::scene::ordinals_contiguous(&scenes));
        let total: f64 = scenes.iter().map(|s| s.target_duration_sec).sum();
        assert!((total - 30.0).abs() < 1e-6);
        assert!(scenes.len() as u32 <= pilot.target_scenes);
    }

    #[tokio::test]
    async fn voiceover_follows_the_audio_tier() {
        let planner = HeuristicScriptPlanner;
        let pilot = Pilot::new(ProductionTier::Static, 1.0);

        let mut silent = brief(10.0);
        silent.audio_tier = AudioTier::None;
        let scenes = planner.plan_scenes(&silent, &pilot).await.unwrap();
        assert!(scenes.iter().all(|s| s.voiceover_text.is_none()));

        let mut narrated = brief(10.0);
        narrated.audio_tier = AudioTier::SimpleOverlay;
        let scenes = planner.plan_scenes(&narrated, &pilot).await.unwrap();
        assert!(scenes.iter().all(|s| s.voiceover_text.is_some()));
    }
}
