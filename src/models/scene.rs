use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{ImagenError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub prompt: String,
}

impl Scene {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.png", self.id)
    }
}

/// Ordered list of scenes to render, one image per scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenePlan {
    scenes: Vec<Scene>,
}

const LYRICS_SCENES: [(&str, &str); 5] = [
    (
        "scene_1_starry_sky",
        "Digital art, a visually stunning image of abstract glowing data points forming a starry night sky over Vietnam's landscape, from majestic mountains to a serene coastline. Represents the line 'Chạm vào từng con số, thấy cả một trời sao'. Hopeful and epic.",
    ),
    (
        "scene_2_smart_city",
        "Futuristic concept art of a smart city in Vietnam connected by brilliant streams of light to high-tech vertical farms in the countryside. Represents 'thành phố thông minh, là đồng quê kết nối'. Clean, vibrant, and optimistic.",
    ),
    (
        "scene_3_gen_z_at_work",
        "Action shot, energetic, diverse young Vietnamese professionals (Gen Z) collaborating in a modern, sunlit office, coding on transparent screens. A glowing shield icon is visible, symbolizing data security. Represents 'Trí tuệ nhân tạo' and 'lá chắn an toàn'.",
    ),
    (
        "scene_4_montage_of_joy",
        "Photorealistic montage showing the positive outcomes of data technology: a smiling elderly woman video-calling her family, a farmer checking crop data on a tablet in a lush field, a bustling successful small business. Represents 'Là nụ cười của mẹ, là tương lai của cha'.",
    ),
    (
        "scene_5_vietnam_glows",
        "Epic landscape photography, a final, stunning aerial shot high above Vietnam at night, showing the entire country glowing with interconnected data streams and light, full of hope and potential. Visualizes 'Một Việt Nam toả sáng, thế giới đang chờ đợi'.",
    ),
];

impl ScenePlan {
    pub fn new(scenes: Vec<Scene>) -> Result<Self> {
        let plan = Self { scenes };
        plan.validate()?;
        Ok(plan)
    }

    /// The five scenes illustrating the song. The lyrics only have to be
    /// readable; the scene prompts are fixed.
    pub fn from_lyrics(lyrics: &str) -> Self {
        log::info!("📝 Deriving scene prompts from lyrics");
        log::debug!("Lyrics length: {} characters", lyrics.chars().count());

        let plan = Self::builtin();
        log::info!("✅ {} image prompts generated from lyrics", plan.len());
        plan
    }

    /// The song's scenes, without reading any lyrics.
    pub fn builtin() -> Self {
        Self {
            scenes: LYRICS_SCENES
                .iter()
                .map(|(id, prompt)| Scene::new(*id, *prompt))
                .collect(),
        }
    }

    /// Parse `[{"id": "...", "prompt": "..."}, ...]`.
    pub fn from_json(json: &str) -> Result<Self> {
        let scenes: Vec<Scene> = serde_json::from_str(json)
            .map_err(|e| ImagenError::Config(format!("invalid scene list: {}", e)))?;
        Self::new(scenes)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ImagenError::Config(format!(
                "could not read scene file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.scenes.is_empty() {
            return Err(ImagenError::Config("scene list must contain at least one scene".into()));
        }
        let mut seen = HashSet::new();
        for scene in &self.scenes {
            let id = scene.id.trim();
            if id.is_empty() {
                return Err(ImagenError::Config("scene id must not be empty".into()));
            }
            if id.contains(['/', '\\']) {
                return Err(ImagenError::Config(format!(
                    "scene id '{}' must not contain path separators",
                    scene.id
                )));
            }
            if scene.prompt.trim().is_empty() {
                return Err(ImagenError::Config(format!(
                    "scene '{}' has an empty prompt",
                    scene.id
                )));
            }
            if !seen.insert(id) {
                return Err(ImagenError::Config(format!(
                    "duplicate scene id '{}'",
                    scene.id
                )));
            }
        }
        Ok(())
    }

    /// One prompt describing the first `limit` scenes, for requesting several
    /// images in a single call.
    pub fn combined_prompt(&self, limit: usize) -> String {
        self.scenes
            .iter()
            .take(limit)
            .map(|scene| format!("{}: {}", scene.id, scene.prompt))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scene> {
        self.scenes.iter()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ScenePlan {
    type Item = &'a Scene;
    type IntoIter = std::slice::Iter<'a, Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.iter()
    }
}
