// Figure knowledge graph: atoms in an id-keyed arena with links expressed
// as id references. Scene-to-figure matches are computed once per pilot
// and cached.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use showreel_types::Scene;

/// Minimum keyword overlap for a figure to count as a match.
const MIN_MATCHING_TERMS: usize = 2;
const CAPTION_TRUNCATE: usize = 150;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureAtom {
    pub atom_id: String,
    pub caption: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Cross-links to related atoms, by id only.
    #[serde(default)]
    pub related: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FigureGraph {
    atoms: HashMap<String, FigureAtom>,
}

impl FigureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, atom: FigureAtom) {
        self.atoms.insert(atom.atom_id.clone(), atom);
    }

    pub fn get(&self, atom_id: &str) -> Option<&FigureAtom> {
        self.atoms.get(atom_id)
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Best figure for the scene by keyword overlap with the caption.
    /// Requires at least two matching terms.
    pub fn match_scene(&self, scene: &Scene) -> Option<FigureMatch> {
        let mut search_terms: HashSet<String> = HashSet::new();
        for term in scene
            .visual_elements
            .iter()
            .chain(std::iter::once(&scene.title))
        {
            for word in term.split(|c: char| !c.is_alphanumeric()) {
                if word.len() > 3 {
                    search_terms.insert(word.to_lowercase());
                }
            }
        }
        if search_terms.is_empty() {
            return None;
        }

        let mut best: Option<(&FigureAtom, usize)> = None;
        for atom in self.atoms.values() {
            let caption = atom.caption.to_lowercase();
            let score = search_terms
                .iter()
                .filter(|term| caption.contains(term.as_str()))
                .count();
            if score >= MIN_MATCHING_TERMS
                && best.map(|(_, existing)| score > existing).unwrap_or(true)
            {
                best = Some((atom, score));
            }
        }

        best.map(|(atom, score)| {
            let mut caption = atom.caption.clone();
            if caption.len() > CAPTION_TRUNCATE {
                caption.truncate(CAPTION_TRUNCATE - 3);
                caption.push_str("...");
            }
            FigureMatch {
                atom_id: atom.atom_id.clone(),
                caption,
                image_url: atom.image_url.clone(),
                matched_terms: score,
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct FigureMatch {
    pub atom_id: String,
    pub caption: String,
    pub image_url: Option<String>,
    pub matched_terms: usize,
}

/// Per-pilot cache of scene-to-figure matches.
#[derive(Debug, Default)]
pub struct SceneFigureIndex {
    matches: HashMap<String, FigureMatch>,
}

impl SceneFigureIndex {
    pub fn build(graph: &FigureGraph, scenes: &[Scene]) -> Self {
        let mut matches = HashMap::new();
        for scene in scenes {
            if let Some(found) = graph.match_scene(scene) {
                tracing::debug!(
                    scene_id = %scene.scene_id,
                    atom_id = %found.atom_id,
                    terms = found.matched_terms,
                    "scene matched a figure"
                );
                matches.insert(scene.scene_id.clone(), found);
            }
        }
        Self { matches }
    }

    pub fn for_scene(&self, scene_id: &str) -> Option<&FigureMatch> {
        self.matches.get(scene_id)
    }
}
