use serde::{Deserialize, Serialize};

/// Styled re-render requested from the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementStyle {
    Studio,
    Lifestyle,
    Creative,
}

impl EnhancementStyle {
    pub fn all() -> &'static [EnhancementStyle] {
        &[
            EnhancementStyle::Studio,
            EnhancementStyle::Lifestyle,
            EnhancementStyle::Creative,
        ]
    }

    pub fn slug(&self) -> &'static str {
        match self {
            EnhancementStyle::Studio => "studio",
            EnhancementStyle::Lifestyle => "lifestyle",
            EnhancementStyle::Creative => "creative",
        }
    }

    fn scene(&self) -> &'static str {
        match self {
            EnhancementStyle::Studio => {
                "A professional studio product photograph of the provided product on a clean \
                 white background with soft, even lighting. High-resolution, sharp focus."
            }
            EnhancementStyle::Lifestyle => {
                "A lifestyle product shot of the provided product on a modern wooden desk with a \
                 coffee cup nearby, natural window lighting, softly blurred background."
            }
            EnhancementStyle::Creative => {
                "A creative product shot of the provided product on a vibrant gradient background \
                 (blue to purple) with dramatic side lighting, studio quality."
            }
        }
    }

    pub fn prompt(&self, product_name: &str) -> String {
        format!(
            "Generate an enhanced marketing image featuring the {}. {} \
             Preserve the product's proportions and core design.",
            product_name,
            self.scene()
        )
    }
}

pub fn shortlist_instruction(frame_count: usize, shortlist_size: usize) -> String {
    format!(
        "These are {} frames from a product video, in chronological order and numbered from 0 \
         to {}. Select up to {} frames in which the main product is shown most clearly. \
         Return only the frame index numbers (0-based), best first, separated by commas.",
        frame_count,
        frame_count.saturating_sub(1),
        shortlist_size
    )
}

pub fn identification_instruction() -> String {
    "Analyze these frames from a product video. Identify the main product being showcased. \
     Return only the product name (e.g., 'iPhone 15 Pro')."
        .to_string()
}

pub fn best_frame_instruction(product_name: &str) -> String {
    format!(
        "From these images, select the frame where the '{}' is most clearly visible, well-lit, \
         and prominently shown. Return only the frame index number (0-based).",
        product_name
    )
}

pub fn segmentation_instruction(product_name: &str) -> String {
    format!(
        "Remove the background from this image, keeping only the {}. Return a PNG image of the \
         product on a fully transparent background without altering the product itself.",
        product_name
    )
}
