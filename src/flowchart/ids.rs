/// Monotonic id source for nodes and edges created at runtime.
///
/// Issued ids have the form `{prefix}{n}`; candidates already taken in the
/// graph are skipped, so an allocator never hands out an id that collides
/// with one parsed from source text.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: &'static str,
    next: u64,
}

impl IdAllocator {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix, next: 1 }
    }

    pub fn next_id(&mut self, is_taken: impl Fn(&str) -> bool) -> String {
        loop {
            let candidate = format!("{}{}", self.prefix, self.next);
            self.next += 1;
            if !is_taken(&candidate) {
                return candidate;
            }
        }
    }
}
