use researchmind_core::Chunk;
use researchmind_text::LexicalIndex;

#[test]
fn rarer_terms_and_denser_matches_rank_higher() {
    let chunks = vec![
        Chunk::from_text(0, "coffee coffee coffee in the morning"),
        Chunk::from_text(1, "coffee in a long afternoon meeting about budgets and hiring plans"),
        Chunk::from_text(2, "melatonin and coffee interact"),
        Chunk::from_text(3, "green tea in the morning"),
    ];
    let idx = LexicalIndex::build(&chunks).expect("build");
    let scores = idx.score("coffee").expect("score");
    assert!(scores[0] > scores[1], "higher term frequency wins: {scores:?}");
    assert_eq!(scores[3], 0.0);

    // "melatonin" appears once in the corpus, "coffee" three times
    let scores = idx.score("melatonin coffee").expect("score");
    let top = idx.top_k("melatonin coffee", 1).expect("top");
    assert_eq!(top[0].0, 2);
    assert_eq!(top[0].1, scores[2]);
}

#[test]
fn repeated_scoring_is_stable() {
    let chunks: Vec<Chunk> = (0..20).map(|i| Chunk::from_text(i, format!("note {i} about sleep and caffeine"))).collect();
    let idx = LexicalIndex::build(&chunks).expect("build");
    let a = idx.top_k("sleep caffeine", 5).expect("top");
    let b = idx.top_k("sleep caffeine", 5).expect("top");
    assert_eq!(a, b);
    assert_eq!(a.iter().map(|t| t.0).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4], "equal scores keep position order");
}
