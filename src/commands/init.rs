use std::path::{Path, PathBuf};

use flatpage::config::{CONFIG_FILE_NAME, SiteConfig};
use flatpage::site::SyntaxHighlighter;

use crate::InitArgs;

const INDEX_PAGE: &str = "/*
Title: Welcome
Description: A fresh flatpage site
*/

# Welcome

Pages live in the `content` directory. Edit `content/index.md` to change
this one, or add `content/about.md` to serve [%base_url%/about](%base_url%/about).
";

const NOT_FOUND_PAGE: &str = "/*
Title: Page Not Found
Robots: noindex,nofollow
*/

# Page Not Found

Nothing lives here. Try the [front page](%base_url%/).
";

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>{% if meta.title %}{{ meta.title }} | {% endif %}{{ site_title }}</title>
    {% if meta.description %}<meta name="description" content="{{ meta.description }}">{% endif %}
    {% if meta.robots %}<meta name="robots" content="{{ meta.robots }}">{% endif %}
    <link rel="stylesheet" href="{{ theme_url }}/highlight.css">
</head>
<body>
    <header>
        <a href="{{ base_url }}/">{{ site_title }}</a>
        <nav>
            {% for page in pages %}<a href="{{ page.url }}">{{ page.title }}</a>
            {% endfor %}
        </nav>
    </header>
    <main>
        {{ content }}
    </main>
    <footer>
        {% if prev_page %}<a href="{{ prev_page.url }}">&larr; {{ prev_page.title }}</a>{% endif %}
        {% if next_page %}<a href="{{ next_page.url }}">{{ next_page.title }} &rarr;</a>{% endif %}
    </footer>
</body>
</html>
"#;

pub async fn run(args: &InitArgs) -> Result<(), anyhow::Error> {
    let path = if args.path.is_relative() {
        std::env::current_dir()?.join(&args.path)
    } else {
        args.path.clone()
    };

    if !path.exists() {
        if args.create {
            tokio::fs::create_dir_all(&path).await?;
            tracing::info!("created directory {}", path.display());
        } else {
            return Err(anyhow::anyhow!(
                "Directory does not exist: {path}",
                path = path.display()
            ));
        }
    }

    tracing::info!("initializing site in {}", path.display());
    scaffold(&path).await
}

async fn scaffold(root: &Path) -> Result<(), anyhow::Error> {
    let site_title = root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "My Site".to_string());
    let config = SiteConfig {
        site_title,
        ..SiteConfig::default()
    };
    let config_text = serde_yaml::to_string(&config)?;

    let theme_dir = config.themes_dir.join(&config.theme);
    let mut files = vec![
        (PathBuf::from(CONFIG_FILE_NAME), config_text),
        (config.content_dir.join("index.md"), INDEX_PAGE.to_string()),
        (config.content_dir.join("404.md"), NOT_FOUND_PAGE.to_string()),
        (theme_dir.join("index.html"), INDEX_TEMPLATE.to_string()),
    ];

    match SyntaxHighlighter::from_config(&config.markdown).stylesheet() {
        Some(css) => files.push((theme_dir.join("highlight.css"), css)),
        None => tracing::warn!(
            theme = %config.markdown.highlight_theme,
            "unknown highlight theme, no stylesheet written"
        ),
    }

    for (relative, text) in files {
        let target = root.join(&relative);
        if target.exists() {
            tracing::warn!("{} already exists, leaving it alone", target.display());
            continue;
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, text).await?;
        tracing::info!("created {}", target.display());
    }

    Ok(())
}
