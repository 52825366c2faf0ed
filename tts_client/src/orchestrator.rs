use crate::error::Result;
use crate::segmenter::split_sentences;
use crate::session::SynthesisSession;
use crate::transport::Transport;
use crate::types::{Endpoint, RequestDefaults};
use std::iter::FusedIterator;

/// Lazy sequence of audio buffers, one per text chunk, in chunk order.
///
/// Each call to `next` runs one [`SynthesisSession`] to completion, so at most
/// one chunk's audio is held at a time and nothing is synthesized until the
/// caller asks for it. After the first error the stream ends.
pub struct AudioStream<'a, T: Transport> {
    transport: &'a T,
    endpoint: &'a Endpoint,
    defaults: RequestDefaults,
    voice: String,
    uid: String,
    chunks: std::vec::IntoIter<String>,
    total: usize,
    completed: usize,
    halted: bool,
}

impl<'a, T: Transport> AudioStream<'a, T> {
    pub fn new(
        transport: &'a T,
        endpoint: &'a Endpoint,
        text: &str,
        voice: &str,
        defaults: &RequestDefaults,
    ) -> Self {
        let chunks = split_sentences(text, defaults.max_chunk_chars);
        let uid = defaults
            .uid
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        log::info!(
            "📝 Split {} chars into {} chunk(s) (limit {})",
            text.chars().count(),
            chunks.len(),
            defaults.max_chunk_chars
        );

        Self {
            transport,
            endpoint,
            defaults: defaults.clone(),
            voice: voice.to_string(),
            uid,
            total: chunks.len(),
            chunks: chunks.into_iter(),
            completed: 0,
            halted: false,
        }
    }

    /// Number of chunks the text was split into
    pub fn total_chunks(&self) -> usize {
        self.total
    }

    /// Chunks whose audio has been yielded so far
    pub fn completed_chunks(&self) -> usize {
        self.completed
    }
}

impl<T: Transport> Iterator for AudioStream<'_, T> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        let chunk = self.chunks.next()?;
        let index = self.completed + 1;

        log::info!(
            "🔊 Synthesizing chunk {}/{}: '{}'",
            index,
            self.total,
            chunk
        );

        let request = self.defaults.build_request(&self.voice, &self.uid, &chunk);
        let mut session =
            SynthesisSession::new(self.transport, self.endpoint, self.defaults.compress);

        match session.run(&request) {
            Ok(audio) => {
                self.completed += 1;
                Some(Ok(audio))
            }
            Err(e) => {
                log::error!("❌ Chunk {}/{} failed, stopping: {}", index, self.total, e);
                self.halted = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.halted {
            (0, Some(0))
        } else {
            (0, Some(self.chunks.len()))
        }
    }
}

impl<T: Transport> FusedIterator for AudioStream<'_, T> {}
