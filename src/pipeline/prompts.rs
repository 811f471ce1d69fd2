// src/pipeline/prompts.rs
use crate::models::VideoScene;

pub const PROMPT_STUDIO: &str = "A professional, ultra-realistic studio photo of the product on a seamless, pure white \
cyclorama background. Soft, diffuse and even lighting from several angles so there are no hard shadows and every \
texture and detail of the product stays visible. Sharp focus across the whole product. No props, no distractions.";

pub const PROMPT_ANGLE: &str = "An ultra-realistic photo of the product on a light, neutral, softly blurred gray \
background. The product is shown at a 45 degree angle, revealing its front and one side so its depth and \
three-dimensional shape are obvious. Lighting accentuates the product's contours.";

pub const PROMPT_TECHNICAL: &str = "A clean, modern infographic-style image. The product sits prominently on a \
minimalist, solid-color background. Add 2 to 3 thin, elegant arrows with callout lines pointing at important \
technical features or materials of the product. End each callout line with clear placeholder text such as \
'[Descrever Característica Chave Aqui]'. The overall design is informative, professional and pleasant.";

pub const PROMPT_MEASUREMENTS: &str = "A split-layout product image. On the left, the product photographed from the \
front against a neutral background. On the right, a clean, minimalist measurement table titled 'Dimensões do \
Produto' with the columns 'Medida' and 'Valor (cm)' and three placeholder rows, 'Altura', 'Largura' and \
'Profundidade', with values left as 'XX cm'.";

/// Used when the scene planner yields fewer usage scenes than the plan needs.
pub const PROMPT_USAGE_FALLBACK: &str = "A lifestyle photo of the product being used in a modern, well lit \
environment, focused on the benefits and the experience of the user.";

pub const SCENE_PLANNER_CONTENT: &str =
    "Analyze the product images and the description in the instructions, then write the scenes.";

pub fn scene_planner_instruction(description: &str, category: &str) -> String {
    let category_context = if category.trim().is_empty() {
        "No product category was provided.".to_string()
    } else {
        format!("Product category: {}", category.trim())
    };

    format!(
        r#"You are an elite e-commerce art director and product photographer. Study the product images and propose 5 complete, professional photographic usage scenes for an image generation model.

Product description (context): {description}
{category_context}

Rules:
1. Read every piece of text visible on the product, its label or its packaging. That text must appear, legible and accurate, in each detailedPrompt.
2. Respond with a JSON object with a "scenes" key holding an array of 5 scene objects.
3. Each scene object has:
   - "summary": an evocative title of at most 10 words, in Brazilian Portuguese, shown to the seller.
   - "detailedPrompt": a long, highly detailed visual brief covering setting, composition and camera angle, lighting, supporting props, mood, and the product text that must stay visible.
4. The product is the star: keep its shape, colors, textures, logos and text 100% faithful.
5. Each scene should quietly communicate the value of the product in the customer's everyday life."#
    )
}

pub fn image_generation_prompt(scene_prompt: &str) -> String {
    format!(
        r#"Place the product from the reference images into the following scene:
"{scene_prompt}"

Mandatory rules:
- Insert the product EXACTLY as it appears in the reference: same shape, color, textures, logos, text, proportions and visible details.
- No adjustments, inventions or modifications to the product.
- Position the product realistically inside the scene; lighting, angles and context adapt to the product, never the reverse.
- The product is the absolute protagonist, integrated into the environment without losing prominence.
- The result must look like a realistic high-definition photograph, never an illustration, CGI or drawing.
- If the scene conflicts with product fidelity, product fidelity wins.

Ultra-realistic raw photo in 8K, shot with a Nikon D850 and NIKKOR 85mm f/1.4 lens. ISO 100, 1/200 s, f/2.2 for natural bokeh. True-to-life colors, natural textures, soft natural daylight. No illustration, no CGI, no digital art. Image ratio always 1:1."#
    )
}

pub fn title_prompt(current_title: &str, brand: &str, model: &str, characteristics: &str) -> String {
    format!(
        r#"You are an e-commerce SEO specialist who optimizes product titles for Mercado Livre and Shopee.

Product:
- Current title: "{current_title}"
- Brand: "{brand}"
- Model: "{model}"
- Key characteristics: "{characteristics}"

Identify the most searched terms, popular synonyms and long-tail keywords buyers use for products like this one, then write, in Brazilian Portuguese:
- 5 unique titles for Mercado Livre, each AT MOST 60 characters, with the most important keywords first.
- 5 unique titles for Shopee, each AT MOST 100 characters, which may carry more characteristics and benefits.

Respond strictly with a JSON object: {{"mercadoLivre": [...], "shopee": [...]}}"#
    )
}

pub fn description_prompt(product_title: &str, model_description: &str) -> String {
    format!(
        r#"You are a senior e-commerce copywriter with deep SEO knowledge.

Product:
- Title: "{product_title}"
- Base description: "{model_description}"

Use your search tool to research Google Trends and Mercado Livre trends for the most relevant search terms for this product, then write a complete, persuasive product description in Brazilian Portuguese:
1. Start with one line holding at least 20 comma-separated keywords.
2. A captivating opening paragraph.
3. 3 to 5 features, each on its own line starting with a hyphen, each translated into a direct benefit.
4. 2 or 3 common objections as question and answer pairs: question on one line, answer on the next, a blank line between pairs.
5. A subtle urgency or scarcity trigger.
6. A clear call to action.
Plain text only: no emojis, no HTML, no commentary before or after the description."#
    )
}

pub fn video_script_prompt(product_title: &str, product_description: &str) -> String {
    format!(
        r#"You are a marketing scriptwriter and director of short viral videos for Reels and TikTok.

Product:
- Title: "{product_title}"
- Description: "{product_description}"
- Reference images are attached; analyze them visually.

Write a script of exactly 6 scenes of 8 seconds each. Each scene guides a video generation model to produce one short, persuasive, standalone clip. Narration and any speech are in Brazilian Portuguese.

Mandatory structure:
1. The pain: a common problem or frustration the product solves.
2. The solution: the product presented as the definitive answer.
3. The benefits: the 2 or 3 main strengths in action.
4. Social proof: a quick positive testimonial or a scene suggesting customer approval.
5. Objection handling: a common doubt answered clearly and visually.
6. Call to action with urgency: limited stock or a special offer.

Respond strictly with a JSON array of 6 objects, each shaped as:
{{"title": "Cena X - [Nome da Cena]", "prompt": "a cinematic, highly detailed description of action, setting, camera angle and visual style. The video must NOT contain any on-screen text, captions or graphic overlays."}}"#
    )
}

/// Wraps one scene for the video model.
pub fn video_job_prompt(scene: &VideoScene) -> String {
    format!(
        "Create an 8 second video in 9:16 vertical format for Reels and Shorts. The video must be dynamic, \
professional and cinematic, and follow this script strictly:\n\nCena: {}\n{}",
        scene.title, scene.prompt
    )
}

pub fn audio_script_prompt(scenes: &[VideoScene]) -> String {
    let script = scenes
        .iter()
        .map(|s| format!("{}: {}", s.title, s.prompt))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a voice-over copywriter. Write the narration, in Brazilian Portuguese, for a promotional video made of the scenes below. Each scene lasts 8 seconds, so keep each scene's narration to about 20 words. Label every block with its scene title and return only the narration text.

{script}"#
    )
}
