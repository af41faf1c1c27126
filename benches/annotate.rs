use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use listing_studio::annotate::{KeywordMatcher, annotate, keywords_in_text};

const KEYWORDS: &[&str] = &[
    "leather tote bag",
    "brass fittings",
    "handmade bag",
    "tote",
    "everyday carry",
    "gift for her",
    "work bag",
    "shoulder bag",
    "phone pocket",
    "market tote",
    "vegetable tanned",
    "minimalist bag",
    "laptop tote",
];

const DESCRIPTION: &str = "A roomy leather tote bag with brass fittings and a phone pocket. \
    This handmade bag is an everyday carry for the office, a work bag that doubles as a \
    market tote, and a thoughtful gift for her. Vegetable tanned leather ages beautifully; \
    the minimalist bag fits a laptop, so it also works as a laptop tote or shoulder bag.";

fn bench_build_matcher(c: &mut Criterion) {
    c.bench_function("matcher::build_13_keywords", |b| {
        b.iter(|| {
            let matcher = KeywordMatcher::new(black_box(KEYWORDS)).expect("valid keywords");
            black_box(matcher.is_empty());
        });
    });
}

fn bench_annotate(c: &mut Criterion) {
    let repeated: Vec<(usize, String)> = [1usize, 4, 16]
        .into_iter()
        .map(|times| (times, vec![DESCRIPTION; times].join(" ")))
        .collect();
    for (times, text) in &repeated {
        c.bench_with_input(BenchmarkId::new("annotate", times), text, |b, text| {
            b.iter(|| {
                let segments = annotate(text, KEYWORDS);
                black_box(segments.len());
            });
        });
    }

    let matcher = KeywordMatcher::new(KEYWORDS).expect("valid keywords");
    c.bench_function("matcher::segments_prebuilt", |b| {
        b.iter(|| black_box(matcher.segments(black_box(DESCRIPTION)).len()));
    });
}

fn bench_keywords_in_title(c: &mut Criterion) {
    let title = "Handmade Leather Tote Bag with Brass Fittings, Minimalist Work Bag";
    c.bench_function("keywords_in_text::title", |b| {
        b.iter(|| black_box(keywords_in_text(black_box(title), KEYWORDS).len()));
    });
}

criterion_group!(
    benches,
    bench_build_matcher,
    bench_annotate,
    bench_keywords_in_title
);
criterion_main!(benches);
