//! Benchmarks for the orphan scan.
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};

use css_orphans::{MarkupDocument, MarkupKind, Preferences, Stylesheet, collect_orphans};

const CHAPTERS: usize = 20;
const CLASSES: usize = 200;

/// A stylesheet with many class rules, half of them used by the chapters.
fn sample_css() -> String {
    let mut css = String::from("@namespace \"http://www.w3.org/1999/xhtml\";\n");
    for i in 0..CLASSES {
        css.push_str(&format!(
            "p.c{i}, div > span.c{i}, h{} + p.c{i} {{ margin: 0.{i}em }}\n",
            i % 6 + 1
        ));
    }
    css.push_str("@media print { p { color: black } a:hover { color: red } }\n");
    css
}

fn sample_chapter(n: usize) -> String {
    let mut body = String::new();
    for i in (n..CLASSES).step_by(2 * CHAPTERS) {
        body.push_str(&format!(
            "<p class=\"c{i}\">Paragraph {i}</p><div><span class=\"c{}\">x</span></div>",
            i + 1
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><body>{body}</body></html>"
    )
}

fn sample_documents() -> Vec<MarkupDocument> {
    (0..CHAPTERS)
        .map(|n| {
            MarkupDocument::parse(format!("c{n}"), sample_chapter(n).as_bytes(), MarkupKind::Xhtml)
                .unwrap()
        })
        .collect()
}

// ============================================================================
// Stylesheet Benchmarks
// ============================================================================

fn bench_parse_stylesheet(c: &mut Criterion) {
    let css = sample_css();
    c.bench_function("parse_stylesheet", |b| {
        b.iter(|| Stylesheet::parse(&css).unwrap());
    });
}

fn bench_serialize_stylesheet(c: &mut Criterion) {
    let sheet = Stylesheet::parse(&sample_css()).unwrap().sheet;
    let prefs = Preferences::default();
    c.bench_function("serialize_stylesheet", |b| {
        b.iter(|| sheet.to_css(&prefs));
    });
}

// ============================================================================
// Scan Benchmarks
// ============================================================================

fn bench_parse_documents(c: &mut Criterion) {
    let chapters: Vec<String> = (0..CHAPTERS).map(sample_chapter).collect();
    c.bench_function("parse_documents", |b| {
        b.iter(|| {
            for chapter in &chapters {
                MarkupDocument::parse("c", chapter.as_bytes(), MarkupKind::Xhtml).unwrap();
            }
        });
    });
}

fn bench_collect_orphans(c: &mut Criterion) {
    let sheet = Stylesheet::parse(&sample_css()).unwrap().sheet;
    let documents = sample_documents();
    c.bench_function("collect_orphans", |b| {
        b.iter(|| collect_orphans("css", "style.css", &sheet, &documents));
    });
}

criterion_group!(
    benches,
    // Stylesheet
    bench_parse_stylesheet,
    bench_serialize_stylesheet,
    // Scan
    bench_parse_documents,
    bench_collect_orphans,
);
criterion_main!(benches);
