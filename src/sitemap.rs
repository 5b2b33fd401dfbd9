use crate::catalog::slugify;
use crate::types::Game;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// `(path, changefreq, priority)` for the fixed pages.
pub const STATIC_ROUTES: &[(&str, &str, &str)] = &[
    ("/", "daily", "1.0"),
    ("/calendar", "weekly", "0.8"),
    ("/watchlist", "weekly", "0.8"),
    ("/compare", "weekly", "0.8"),
    ("/tier-list", "weekly", "0.8"),
    ("/top-5", "weekly", "0.8"),
    ("/bracket", "weekly", "0.8"),
];

pub fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn url_entry(out: &mut String, loc: &str, lastmod: &str, changefreq: &str, priority: &str) {
    out.push_str("  <url>\n");
    out.push_str(&format!("    <loc>{}</loc>\n", xml_escape(loc)));
    out.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
    out.push_str(&format!("    <changefreq>{changefreq}</changefreq>\n"));
    out.push_str(&format!("    <priority>{priority}</priority>\n"));
    out.push_str("  </url>\n");
}

pub fn build_sitemap(games: &[Game], base_url: &str, today: NaiveDate) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let lastmod = today.format("%Y-%m-%d").to_string();
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    for (path, changefreq, priority) in STATIC_ROUTES {
        url_entry(&mut out, &format!("{base}{path}"), &lastmod, changefreq, priority);
    }

    for game in games {
        url_entry(&mut out, &format!("{base}/games/{}", game.slug), &lastmod, "weekly", "0.7");
    }

    let genres: BTreeSet<String> = games
        .iter()
        .flat_map(|game| game.genres.iter())
        .map(|genre| slugify(genre))
        .filter(|slug| !slug.is_empty())
        .collect();
    for genre in genres {
        url_entry(&mut out, &format!("{base}/genres/{genre}"), &lastmod, "weekly", "0.6");
    }

    let platforms: BTreeSet<String> = games
        .iter()
        .flat_map(|game| game.platforms.iter())
        .map(|platform| slugify(platform))
        .filter(|slug| !slug.is_empty())
        .collect();
    for platform in platforms {
        url_entry(&mut out, &format!("{base}/platforms/{platform}"), &lastmod, "weekly", "0.6");
    }

    out.push_str("</urlset>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(slug: &str, platforms: &[&str], genres: &[&str]) -> Game {
        Game {
            id: slug.to_string(),
            title: slug.to_string(),
            slug: slug.to_string(),
            release_date: String::new(),
            platforms: platforms.iter().map(|s| s.to_string()).collect(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
            hype: 0,
            image: None,
            summary: None,
            screenshots: Vec::new(),
            videos: Vec::new(),
            similar_games: Vec::new(),
            source: None,
        }
    }

    #[test]
    fn sitemap_lists_routes_games_genres_and_platforms() {
        let games = vec![
            game("star-voyager", &["PC", "PlayStation 5"], &["RPG"]),
            game("dune-racer", &["PC"], &["Racing", "RPG"]),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let xml = build_sitemap(&games, "https://radar.test/", today);

        assert!(xml.starts_with("<?xml"));
        assert_eq!(xml.matches("<url>").count(), STATIC_ROUTES.len() + 2 + 2 + 2);
        assert!(xml.contains("<loc>https://radar.test/</loc>"));
        assert!(xml.contains("<loc>https://radar.test/games/dune-racer</loc>"));
        assert!(xml.contains("<loc>https://radar.test/genres/rpg</loc>"));
        assert!(xml.contains("<loc>https://radar.test/platforms/playstation-5</loc>"));
        assert!(xml.contains("<lastmod>2026-02-01</lastmod>"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn escapes_xml_entities() {
        assert_eq!(xml_escape("a&b<c>\"'"), "a&amp;b&lt;c&gt;&quot;&apos;");
    }
}
