//! Two turns of a conversation over a three-case corpus, fully offline.
//!
//! Run with `RUST_LOG=casebook_dialogue=debug` to watch the controller walk
//! its nodes.

use std::sync::Arc;

use async_trait::async_trait;
use casebook_dialogue::{
    AgentReply, Conversation, DialogueController, DialogueError, Generator,
    MemoryCheckpointStore, Message, RagPrompt, ThreadId,
};
use casebook_embeddings::{Encoder, HashingEncoder, VectorIndex};
use casebook_retrieval::{Corpus, Retriever};
use casebook_tools::ToolDescriptor;
use tracing_subscriber::EnvFilter;

const DIMENSION: usize = 256;

/// Stands in for a language model: quotes the closest case back.
struct QuotingGenerator;

#[async_trait]
impl Generator for QuotingGenerator {
    fn name(&self) -> &str {
        "quoting"
    }

    async fn answer(&self, prompt: &RagPrompt) -> casebook_dialogue::Result<String> {
        let closest = prompt.context.split("\n\n---\n\n").next().unwrap_or_default();
        let turns = prompt.history.lines().count() / 2;
        Ok(format!(
            "(turno previo: {turns}) Para \"{}\", el caso más cercano es: {closest}",
            prompt.question
        ))
    }

    async fn chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> casebook_dialogue::Result<AgentReply> {
        Err(DialogueError::GeneratorNotConfigured)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cases = vec![
        "Nombre: Ana, 21 años. Ansiedad intensa antes de cada examen.".to_string(),
        "Nombre: Bruno, 45 años. Insomnio asociado a estrés laboral.".to_string(),
        "Nombre: Carla, 60 años. Dolor crónico lumbar y ánimo bajo.".to_string(),
    ];

    let encoder = Arc::new(HashingEncoder::new(DIMENSION));
    let vectors = encoder.encode_batch(&cases).await?;
    let index = VectorIndex::build(DIMENSION, vectors)?;
    let retriever = Arc::new(Retriever::new(encoder, index, Corpus::from_texts(cases))?);

    let controller = DialogueController::rag(retriever, Arc::new(QuotingGenerator)).with_top_k(2);
    let conversation = Conversation::new(controller, Arc::new(MemoryCheckpointStore::new()));

    let thread = ThreadId::new();
    for question in ["paciente con insomnio y estrés", "¿y si además tiene ansiedad?"] {
        let answer = conversation.respond(&thread, question).await?;
        println!("> {question}\n{answer}\n");
    }

    let history = conversation.history(&thread).await?;
    println!("Thread {thread} holds {} messages", history.len());
    Ok(())
}
