use std::collections::BTreeSet;

use review_lda::{
    fit_topics, normalize_reviews, tokenize_reviews, top_terms, DocumentTermMatrix, Inference, Normalizer,
    OnlineLdaBuilder, Resources, Review, TopicConfig, TopicFit, TopicModel,
};

// The broccoli corpus, twice over with small variations, to reach twenty documents.
const DOCSET: [&str; 10] = [
    "Brocolli is good to eat. My brother likes to eat good brocolli, but not my mother.",
    "My mother spends a lot of time driving my brother around to baseball practice.",
    "Some health experts suggest that driving may cause increased tension and blood pressure.",
    "I often feel pressure to perform well at school, but my mother never seems to drive my brother to do better.",
    "Health professionals say that brocolli is good for your health.",
    "Eating brocolli is good, my brother says, and my mother agrees.",
    "Baseball practice means driving my brother around town every week.",
    "Health experts link tension and blood pressure to long hours driving.",
    "School pressure keeps my brother busy while my mother drives.",
    "Professionals say health improves when you eat brocolli and vegetables.",
];

fn counts() -> DocumentTermMatrix {
    let reviews: Vec<Review> = DOCSET
        .iter()
        .chain(DOCSET.iter())
        .enumerate()
        .map(|(id, text)| Review::new(id, 5, *text))
        .collect();
    let (cleaned, _) = normalize_reviews(reviews, &Normalizer::standard());
    let records = tokenize_reviews(&cleaned, &Resources::english());
    let ids: Vec<usize> = cleaned.iter().map(|r| r.document_id).collect();
    DocumentTermMatrix::counts(&ids, &records).prune(0.05)
}

fn check_fit(fit: &TopicFit, n_terms: usize) {
    assert_eq!(fit.n_topics(), 3);
    assert_eq!(fit.beta.dim(), (3, n_terms));
    for row in fit.beta.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-6, "topic sums to {}", row.sum());
    }
    assert_eq!(fit.gamma.nrows(), 20);
    for row in fit.gamma.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-6);
    }

    let top = top_terms(fit, 15);
    assert_eq!(top.len(), 3);
    for terms in top.values() {
        assert_eq!(terms.len(), 15.min(n_terms));
        assert!(terms.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}

#[test]
fn gibbs_topics() {
    let dtm = counts();
    assert!(dtm.n_terms() > 15);
    let mut config = TopicConfig::default();
    config.iterations = 100;

    let fit = fit_topics(&dtm, &config, 7).unwrap();
    check_fit(&fit, dtm.n_terms());
}

#[test]
fn online_topics() {
    let dtm = counts();
    let mut config = TopicConfig::default();
    config.inference = Inference::OnlineVariational;
    config.passes = 20;
    config.batch_size = 5;

    let fit = fit_topics(&dtm, &config, 7).unwrap();
    check_fit(&fit, dtm.n_terms());
}

#[test]
fn same_seed_same_top_terms() {
    let dtm = counts();
    let mut config = TopicConfig::default();
    config.iterations = 50;

    let sets = |fit: &TopicFit| -> BTreeSet<Vec<String>> {
        top_terms(fit, 5)
            .into_iter()
            .map(|(_, terms)| {
                let mut words: Vec<String> = terms.into_iter().map(|(w, _)| w).collect();
                words.sort();
                words
            })
            .collect()
    };
    let a = fit_topics(&dtm, &config, 3).unwrap();
    let b = fit_topics(&dtm, &config, 3).unwrap();
    assert_eq!(sets(&a), sets(&b));
}

#[test]
fn small_vocabulary_gives_short_lists() {
    let records: Vec<review_lda::TokenRecord> = (0..20)
        .flat_map(|doc| {
            ["cheap", "sturdy"].iter().map(move |w| review_lda::TokenRecord {
                document_id: doc,
                token: (*w).to_owned(),
                lemma: (*w).to_owned(),
            })
        })
        .collect();
    let ids: Vec<usize> = (0..20).collect();
    let dtm = DocumentTermMatrix::counts(&ids, &records);

    let mut config = TopicConfig::default();
    config.iterations = 10;
    let fit = fit_topics(&dtm, &config, 1).unwrap();
    check_fit(&fit, 2);
}

#[test]
fn online_model_perplexity_is_finite() {
    let dtm = counts();
    let mut olda = OnlineLdaBuilder::new(dtm.n_terms(), dtm.n_docs(), 2).build().unwrap();

    let mut perplexity = 0.0;
    for _ in 0..20 {
        for doc in dtm.rows() {
            perplexity = olda.update(std::slice::from_ref(doc)).unwrap();
        }
    }
    assert!(perplexity.is_finite() && perplexity > 0.0);

    let top = olda.topic_top_n(0, 5);
    assert_eq!(top.len(), 5);
    assert_eq!(olda.beta().dim(), (2, dtm.n_terms()));
}
