//! Fixed knowledge base seeded into every session.

use crate::vector_db::Document;

const SEED_TEXTS: [&str; 15] = [
    "Argentina won the FIFA World Cup in 2022.",
    "The capital of France is Paris.",
    "Groq provides ultra-fast inference for LLMs.",
    "Max Verstappen won the Formula 1 Drivers Championship in 2024.",
    "Red Bull Racing won the Formula 1 Constructors Championship in 2024.",
    "Cristiano Ronaldo has scored more than 850 career goals across club and country.",
    "The Great Wall of China is over 21,000 kilometers long.",
    "Python is a popular programming language created by Guido van Rossum in 1991.",
    "Mount Everest is the tallest mountain in the world, standing at 8,849 meters.",
    "Apple Inc. was founded by Steve Jobs, Steve Wozniak, and Ronald Wayne in 1976.",
    "The Amazon Rainforest produces 20% of the world's oxygen supply.",
    "India became independent from British rule on August 15, 1947.",
    "The speed of light is approximately 299,792 kilometers per second.",
    "The human brain has around 86 billion neurons.",
    "The Taj Mahal, located in Agra, India, was built by Mughal Emperor Shah Jahan.",
];

/// Seed documents with ids `doc1` through `doc15`.
pub fn seed_documents() -> Vec<Document> {
    SEED_TEXTS
        .iter()
        .enumerate()
        .map(|(i, text)| Document::with_id(format!("doc{}", i + 1), *text))
        .collect()
}
