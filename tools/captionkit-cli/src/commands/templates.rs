//! List caption templates.

use captionkit_common::config::AppConfig;

pub fn run(config: &AppConfig, show: Option<String>) -> anyhow::Result<()> {
    let templates = super::load_templates(config)?;

    if let Some(name) = show {
        let style = templates.get(&name)?;
        println!("{}", serde_json::to_string_pretty(&style)?);
        return Ok(());
    }

    let mut names: Vec<&str> = templates.names().collect();
    names.sort_unstable();

    println!("Caption templates ({}):", names.len());
    for name in names {
        let style = templates.get(name)?;
        let mut traits = Vec::new();
        if style.active_karaoke().is_some() {
            traits.push("karaoke".to_string());
        }
        if !style.keywords.is_empty() {
            traits.push(format!("{} keyword(s)", style.keywords.len()));
        }
        if let Some(animation) = &style.animation {
            traits.push(format!("{:?}", animation.kind).to_lowercase());
        }
        println!(
            "  {name:<12} {} {}px {}{}",
            style.font_family,
            style.font_size,
            style.color.to_hex(),
            if traits.is_empty() {
                String::new()
            } else {
                format!(" ({})", traits.join(", "))
            }
        );
    }

    Ok(())
}
