//! `#[...]#` envelope framing and fixed-size chunking for the device CLI.

pub const ENVELOPE_OPEN: &str = "#[";
pub const ENVELOPE_CLOSE: &str = "]#";
pub const CONFIG_PREFIX: &str = "CFG:";
pub const COMMAND_PREFIX: &str = "CMD:";
pub const DEFAULT_CHUNK_SIZE: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Config,
    Command,
}

impl PayloadKind {
    pub fn prefix(self) -> &'static str {
        match self {
            PayloadKind::Config => CONFIG_PREFIX,
            PayloadKind::Command => COMMAND_PREFIX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    text: String,
}

impl Envelope {
    /// Frames `payload`. An empty `password_hash` leaves out the auth segment.
    pub fn new(kind: PayloadKind, password_hash: &str, payload: &str) -> Self {
        let mut text = String::from(ENVELOPE_OPEN);
        if !password_hash.is_empty() {
            text.push_str(password_hash);
            text.push('/');
        }
        text.push_str(kind.prefix());
        text.extend(payload.chars().filter(|&c| c != '\n' && c != '\r'));
        text.push_str(ENVELOPE_CLOSE);
        Self { text }
    }

    pub fn config(password_hash: &str, payload: &str) -> Self {
        Self::new(PayloadKind::Config, password_hash, payload)
    }

    pub fn command(password_hash: &str, payload: &str) -> Self {
        Self::new(PayloadKind::Command, password_hash, payload)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Splits `text` into pieces of `size` characters; the last may be shorter.
pub fn chunk(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// An envelope together with its current transport lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedOutput {
    envelope: Envelope,
    chunk_size: usize,
    chunks: Vec<String>,
}

impl ChunkedOutput {
    pub fn new(envelope: Envelope, chunk_size: usize) -> Self {
        let chunks = chunk(envelope.as_str(), chunk_size);
        Self {
            envelope,
            chunk_size: chunk_size.max(1),
            chunks,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Re-chunks the existing envelope; nothing is regenerated.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
        self.chunks = chunk(self.envelope.as_str(), self.chunk_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_auth() {
        let hash = "a".repeat(64);
        let envelope = Envelope::config(&hash, "CD,330/");
        assert_eq!(envelope.as_str(), format!("#[{}/CFG:CD,330/]#", hash));
    }

    #[test]
    fn test_envelope_without_auth_strips_newlines() {
        let envelope = Envelope::config("", "CD,330/\nI,i01,3/");
        assert_eq!(envelope.as_str(), "#[CFG:CD,330/I,i01,3/]#");
        assert_eq!(Envelope::command("", "RESET").as_str(), "#[CMD:RESET]#");
    }

    #[test]
    fn test_chunks_reconstruct() {
        let text = "#[CFG:S,o01,5,o02,6/I,i01,3/]#";
        for size in 1..=text.len() + 2 {
            let chunks = chunk(text, size);
            assert_eq!(chunks.concat(), text);
            assert!(chunks.iter().all(|c| c.chars().count() <= size));
        }
        assert_eq!(chunk(text, 0).len(), text.len());
        assert!(chunk("", 18).is_empty());
    }

    #[test]
    fn test_rechunk_keeps_envelope() {
        let envelope = Envelope::config("", "S,o01,5,o02,6/I,i01,3/");
        let mut output = ChunkedOutput::new(envelope.clone(), 18);
        assert_eq!(output.chunks()[0], "#[CFG:S,o01,5,o02,");
        output.set_chunk_size(10);
        assert_eq!(output.envelope(), &envelope);
        assert_eq!(output.chunks()[0], "#[CFG:S,o0");
        assert_eq!(output.chunks().concat(), envelope.as_str());
    }
}
