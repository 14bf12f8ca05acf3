use super::*;

/// Navigation history: a stack of requests with a cursor.
#[derive(Debug, Clone, Default)]
pub struct History {
    stack: Vec<Request>,
    position: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `request` as the current page, discarding any forward entries.
    pub fn add(&mut self, request: Request) {
        if !self.stack.is_empty() {
            self.stack.truncate(self.position + 1);
        }
        self.stack.push(request);
        self.position = self.stack.len() - 1;
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Zero-based index of the current entry.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<&Request> {
        self.stack.get(self.position)
    }

    pub fn back(&mut self) -> Result<&Request> {
        if self.position == 0 || self.stack.is_empty() {
            return Err(Error::Usage("You are already on the first page.".into()));
        }
        self.position -= 1;
        Ok(&self.stack[self.position])
    }

    pub fn forward(&mut self) -> Result<&Request> {
        if self.position + 1 >= self.stack.len() {
            return Err(Error::Usage("You are already on the last page.".into()));
        }
        self.position += 1;
        Ok(&self.stack[self.position])
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(history: &mut History, path: &str) {
        history.add(Request::new("GET", format!("http://localhost{path}")));
    }

    #[test]
    fn back_and_forward_walk_the_stack() -> Result<()> {
        let mut history = History::new();
        for path in ["/a", "/b", "/c"] {
            visit(&mut history, path);
        }
        assert_eq!(history.position(), 2);
        assert_eq!(history.back()?.uri, "http://localhost/b");
        assert_eq!(history.back()?.uri, "http://localhost/a");
        assert!(history.back().is_err());
        assert_eq!(history.forward()?.uri, "http://localhost/b");
        Ok(())
    }

    #[test]
    fn adding_after_back_drops_forward_entries() -> Result<()> {
        let mut history = History::new();
        for path in ["/a", "/b", "/c"] {
            visit(&mut history, path);
        }
        history.back()?;
        visit(&mut history, "/d");
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.current().map(|request| request.uri.as_str()),
            Some("http://localhost/d")
        );
        assert!(history.forward().is_err());
        Ok(())
    }
}
