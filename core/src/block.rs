//! Minimal block tree for nginx-style documents.
//!
//! Every node is a directive (`name args;`) or a block (`name args { ... }`).
//! Tokenizing is by `{`, `}` and `;` rather than by line, so directives
//! wrapped over several lines still land in the right block. The builder is
//! lenient: a stray `}` is dropped and unclosed blocks close at end of input.

/// A directive or a block with ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directive {
        name: String,
        args: Vec<String>,
    },
    Block {
        name: String,
        args: Vec<String>,
        children: Vec<Node>,
    },
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Directive { name, .. } | Node::Block { name, .. } => name,
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            Node::Directive { args, .. } | Node::Block { args, .. } => args,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Directive { .. } => &[],
            Node::Block { children, .. } => children,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block { .. })
    }

    /// First node named `name` in this subtree, depth-first, excluding self
    pub fn find(&self, name: &str) -> Option<&Node> {
        find_in(self.children(), name)
    }

    /// All nodes named `name` in this subtree, depth-first, excluding self
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Node> {
        let mut out = Vec::new();
        collect(self.children(), name, &mut out);
        out
    }
}

fn find_in<'a>(nodes: &'a [Node], name: &str) -> Option<&'a Node> {
    for node in nodes {
        if node.name() == name {
            return Some(node);
        }
        if let Some(found) = find_in(node.children(), name) {
            return Some(found);
        }
    }
    None
}

fn collect<'a>(nodes: &'a [Node], name: &str, out: &mut Vec<&'a Node>) {
    for node in nodes {
        if node.name() == name {
            out.push(node);
        }
        collect(node.children(), name, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semi,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = input.chars().peekable();

    fn flush(word: &mut String, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '#' if word.is_empty() => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '"' | '\'' => {
                let quote = c;
                while let Some(next) = chars.next() {
                    if next == '\\' {
                        if let Some(escaped) = chars.next() {
                            word.push(escaped);
                        }
                    } else if next == quote {
                        break;
                    } else {
                        word.push(next);
                    }
                }
            }
            '{' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Open);
            }
            '}' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Close);
            }
            ';' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Semi);
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);

    tokens
}

/// Blocks nested deeper than this are skipped whole
pub const MAX_DEPTH: usize = 64;

/// Parsed document as a forest of top-level nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTree {
    pub nodes: Vec<Node>,
}

/// A block still waiting for its closing brace
struct OpenBlock {
    name: String,
    args: Vec<String>,
    children: Vec<Node>,
}

impl OpenBlock {
    fn into_node(self) -> Node {
        Node::Block {
            name: self.name,
            args: self.args,
            children: self.children,
        }
    }
}

fn split_words(words: &mut Vec<String>) -> (String, Vec<String>) {
    if words.is_empty() {
        (String::new(), Vec::new())
    } else {
        let name = words.remove(0);
        (name, std::mem::take(words))
    }
}

fn push_node(stack: &mut [OpenBlock], roots: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

impl BlockTree {
    pub fn parse(input: &str) -> Self {
        let mut roots = Vec::new();
        let mut stack: Vec<OpenBlock> = Vec::new();
        let mut words: Vec<String> = Vec::new();
        // open braces seen inside a skipped block
        let mut skipped = 0usize;

        for token in tokenize(input) {
            if skipped > 0 {
                match token {
                    Token::Open => skipped += 1,
                    Token::Close => skipped -= 1,
                    _ => {}
                }
                continue;
            }

            match token {
                Token::Word(w) => words.push(w),
                Token::Semi => {
                    if !words.is_empty() {
                        let (name, args) = split_words(&mut words);
                        push_node(&mut stack, &mut roots, Node::Directive { name, args });
                    }
                }
                Token::Open => {
                    if stack.len() >= MAX_DEPTH {
                        words.clear();
                        skipped = 1;
                        continue;
                    }
                    let (name, args) = split_words(&mut words);
                    stack.push(OpenBlock {
                        name,
                        args,
                        children: Vec::new(),
                    });
                }
                Token::Close => {
                    words.clear();
                    // a stray closer at the top level is dropped
                    if let Some(block) = stack.pop() {
                        push_node(&mut stack, &mut roots, block.into_node());
                    }
                }
            }
        }

        // unclosed blocks close at end of input
        while let Some(block) = stack.pop() {
            push_node(&mut stack, &mut roots, block.into_node());
        }

        Self { nodes: roots }
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        find_in(&self.nodes, name)
    }

    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Node> {
        let mut out = Vec::new();
        collect(&self.nodes, name, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_blocks() {
        let tree = BlockTree::parse(
            "server {\n    listen 80;\n    location / {\n        proxy_pass http://a:1;\n    }\n}\n",
        );
        assert_eq!(tree.nodes.len(), 1);
        let server = &tree.nodes[0];
        assert_eq!(server.name(), "server");
        assert_eq!(server.children().len(), 2);
        let location = server.find("location").unwrap();
        assert_eq!(location.args(), &["/".to_string()]);
        assert_eq!(
            location.find("proxy_pass").unwrap().args(),
            &["http://a:1".to_string()]
        );
    }

    #[test]
    fn test_parse_wrapped_directive() {
        let tree = BlockTree::parse("server {\n    server_name\n        a.com\n        b.com;\n}\n");
        let names = tree.find("server_name").unwrap();
        assert_eq!(names.args(), &["a.com".to_string(), "b.com".to_string()]);
    }

    #[test]
    fn test_parse_comments_and_quotes() {
        let tree = BlockTree::parse(
            "# header { not a block\nadd_header X-Test \"a; b { c\"; # trailing;\nlisten 80;\n",
        );
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.nodes[0].args()[1], "a; b { c");
        assert_eq!(tree.nodes[1].name(), "listen");
    }

    #[test]
    fn test_parse_is_lenient() {
        let tree = BlockTree::parse("}\nserver {\n    listen 80;\n");
        assert_eq!(tree.nodes.len(), 1);
        assert!(tree.nodes[0].is_block());
        assert_eq!(tree.find_all("listen").len(), 1);
    }

    #[test]
    fn test_deep_nesting_is_capped() {
        let tree = BlockTree::parse(&"{".repeat(200_000));
        assert_eq!(tree.nodes.len(), 1);

        let mut depth = 0;
        let mut node = &tree.nodes[0];
        while let Some(child) = node.children().first() {
            depth += 1;
            node = child;
        }
        assert_eq!(depth, MAX_DEPTH - 1);
    }

    #[test]
    fn test_parsing_resumes_after_skipped_block() {
        let input = format!(
            "{}listen 1;{}\nlisten 80;\nserver {{ server_name a.com; }}\n",
            "x {".repeat(100),
            "}".repeat(100)
        );
        let tree = BlockTree::parse(&input);
        let listens: Vec<&str> = tree
            .find_all("listen")
            .iter()
            .map(|n| n.args()[0].as_str())
            .collect();
        assert_eq!(listens, vec!["80"]);
        assert_eq!(tree.find("server_name").unwrap().args(), &["a.com".to_string()]);
        assert_eq!(tree.nodes.len(), 3);
    }

    #[test]
    fn test_find_all_depth_first() {
        let tree = BlockTree::parse(
            "server { listen 80; }\nserver { listen 443 ssl; location / { listen 1; } }\n",
        );
        let listens: Vec<&str> = tree
            .find_all("listen")
            .iter()
            .map(|n| n.args()[0].as_str())
            .collect();
        assert_eq!(listens, vec!["80", "443", "1"]);
    }
}
