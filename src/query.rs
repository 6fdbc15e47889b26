/*
Tokenization is case-insensitive and deliberately simple: parentheses,
commas, `*` and `=` are always their own token, single-quoted runs are
captured whole as string literals (quotes stripped, no escaping), and
everything else is split on whitespace. Keyword matching folds case;
identifiers and string literals keep whatever case the source text used
since literal comparisons downstream are byte-exact.

Grammar covered:
  SELECT (* | COUNT(*) | col[, col...]) FROM table [WHERE col = literal]
  CREATE TABLE name (col type [constraint...][, col type [constraint...]]*)
  CREATE INDEX name ON table (col)
*/
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("expected an identifier but found reserved keyword '{0}'")]
    KeywordAsIdentifier(String),
    #[error("trailing tokens after a complete statement")]
    TrailingTokens,
    #[error("string literal was never closed")]
    UnterminatedLiteral,
    #[error("statement is outside the supported query subset")]
    UnsupportedQuery,
}

const RESERVED: &[&str] = &["select", "from", "where", "create", "table", "index", "on", "count"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Star,
    Op(Operator),
    Word(String),
    StringLiteral(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '=' => {
                // `=` and `==` both mean equality; swallow a doubled sign.
                i += 1;
                if chars.get(i) == Some(&'=') {
                    i += 1;
                }
                tokens.push(Token::Op(Operator::Eq));
            }
            '!' => {
                if chars.get(i + 1) != Some(&'=') {
                    return Err(ParseError::UnexpectedToken("!".to_string()));
                }
                tokens.push(Token::Op(Operator::Ne));
                i += 2;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(Operator::Le));
                    i += 2;
                } else {
                    tokens.push(Token::Op(Operator::Lt));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(Operator::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(Operator::Gt));
                    i += 1;
                }
            }
            c if c.is_whitespace() => i += 1,
            '\'' => {
                let mut j = i + 1;
                let mut literal = String::new();
                loop {
                    if j >= chars.len() {
                        return Err(ParseError::UnterminatedLiteral);
                    }
                    if chars[j] == '\'' {
                        break;
                    }
                    literal.push(chars[j]);
                    j += 1;
                }
                tokens.push(Token::StringLiteral(literal));
                i = j + 1;
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !"(),*='!<>".contains(chars[i])
                {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumns {
    Star,
    Count,
    Named(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub column: String,
    pub op: ComparisonOp,
    pub literal: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub columns: SelectColumns,
    pub table: String,
    pub filter: Option<WhereClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: String,
    pub constraints: Vec<String>,
}

impl ColumnDef {
    /// True iff this column is the INTEGER PRIMARY KEY row id alias: declared
    /// type INTEGER and a constraint list carrying both PRIMARY and KEY,
    /// case-insensitively.
    pub fn is_integer_primary_key(&self) -> bool {
        self.declared_type.eq_ignore_ascii_case("integer")
            && self
                .constraints
                .iter()
                .any(|c| c.eq_ignore_ascii_case("primary"))
            && self
                .constraints
                .iter()
                .any(|c| c.eq_ignore_ascii_case("key"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub index_name: String,
    pub table_name: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    CreateTable(CreateTableStatement),
    CreateIndex(CreateIndexStatement),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::UnexpectedToken("end of input".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        match self.advance()? {
            Token::Word(w) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(ParseError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Word(w)) = self.peek() {
            if w.eq_ignore_ascii_case(keyword) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, token: Token) -> Result<(), ParseError> {
        match self.advance()? {
            t if t == token => Ok(()),
            other => Err(ParseError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.advance()? {
            Token::Word(w) => {
                if RESERVED.iter().any(|kw| w.eq_ignore_ascii_case(kw)) {
                    Err(ParseError::KeywordAsIdentifier(w))
                } else {
                    Ok(w)
                }
            }
            other => Err(ParseError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(ParseError::TrailingTokens)
        }
    }

    fn parse_select(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect_keyword("select")?;
        let columns = self.parse_select_columns()?;
        self.expect_keyword("from")?;
        let table = self.expect_identifier()?;
        let filter = if self.match_keyword("where") {
            Some(self.parse_where()?)
        } else {
            None
        };
        self.expect_end()?;
        Ok(SelectStatement {
            columns,
            table,
            filter,
        })
    }

    fn parse_select_columns(&mut self) -> Result<SelectColumns, ParseError> {
        if self.match_token(&Token::Star) {
            return Ok(SelectColumns::Star);
        }
        if self.match_keyword("count") {
            self.expect_token(Token::LParen)?;
            self.expect_token(Token::Star)?;
            self.expect_token(Token::RParen)?;
            return Ok(SelectColumns::Count);
        }

        let mut columns = vec![self.expect_identifier()?];
        while self.match_token(&Token::Comma) {
            columns.push(self.expect_identifier()?);
        }
        Ok(SelectColumns::Named(columns))
    }

    fn parse_comparator(&mut self) -> Result<ComparisonOp, ParseError> {
        match self.advance()? {
            Token::Op(Operator::Eq) => Ok(ComparisonOp::Eq),
            Token::Op(Operator::Ne) => Ok(ComparisonOp::Ne),
            Token::Op(Operator::Lt) => Ok(ComparisonOp::Lt),
            Token::Op(Operator::Gt) => Ok(ComparisonOp::Gt),
            Token::Op(Operator::Le) => Ok(ComparisonOp::Le),
            Token::Op(Operator::Ge) => Ok(ComparisonOp::Ge),
            other => Err(ParseError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn parse_where(&mut self) -> Result<WhereClause, ParseError> {
        let column = self.expect_identifier()?;
        let op = self.parse_comparator()?;
        let literal = match self.advance()? {
            Token::StringLiteral(s) => Literal::Text(s),
            Token::Word(w) => w
                .parse::<i64>()
                .map(Literal::Integer)
                .map_err(|_| ParseError::UnexpectedToken(w))?,
            other => return Err(ParseError::UnexpectedToken(format!("{other:?}"))),
        };
        Ok(WhereClause {
            column,
            op,
            literal,
        })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, ParseError> {
        let name = self.expect_identifier()?;
        let declared_type = match self.advance()? {
            Token::Word(w) => w,
            other => return Err(ParseError::UnexpectedToken(format!("{other:?}"))),
        };

        let mut constraints = Vec::new();
        while let Some(Token::Word(w)) = self.peek() {
            constraints.push(w.clone());
            self.pos += 1;
        }

        Ok(ColumnDef {
            name,
            declared_type,
            constraints,
        })
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStatement, ParseError> {
        self.expect_keyword("create")?;
        self.expect_keyword("table")?;
        let name = self.expect_identifier()?;
        self.expect_token(Token::LParen)?;

        let mut columns = vec![self.parse_column_def()?];
        while self.match_token(&Token::Comma) {
            columns.push(self.parse_column_def()?);
        }
        self.expect_token(Token::RParen)?;
        self.expect_end()?;

        Ok(CreateTableStatement { name, columns })
    }

    fn parse_create_index(&mut self) -> Result<CreateIndexStatement, ParseError> {
        self.expect_keyword("create")?;
        self.expect_keyword("index")?;
        let index_name = self.expect_identifier()?;
        self.expect_keyword("on")?;
        let table_name = self.expect_identifier()?;
        self.expect_token(Token::LParen)?;
        let column = self.expect_identifier()?;
        self.expect_token(Token::RParen)?;
        self.expect_end()?;

        Ok(CreateIndexStatement {
            index_name,
            table_name,
            column,
        })
    }
}

pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };

    let leading_keyword = match parser.peek() {
        Some(Token::Word(w)) => w.to_ascii_lowercase(),
        _ => return Err(ParseError::UnsupportedQuery),
    };

    match leading_keyword.as_str() {
        "select" => Ok(Statement::Select(parser.parse_select()?)),
        "create" => match parser.tokens.get(1) {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("table") => {
                Ok(Statement::CreateTable(parser.parse_create_table()?))
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("index") => {
                Ok(Statement::CreateIndex(parser.parse_create_index()?))
            }
            _ => Err(ParseError::UnsupportedQuery),
        },
        _ => Err(ParseError::UnsupportedQuery),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select_star() {
        let stmt = parse("SELECT * FROM apples").unwrap();
        match stmt {
            Statement::Select(s) => {
                assert_eq!(s.columns, SelectColumns::Star);
                assert_eq!(s.table, "apples");
                assert!(s.filter.is_none());
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn parses_select_count_star() {
        let stmt = parse("select count(*) from oranges").unwrap();
        match stmt {
            Statement::Select(s) => assert_eq!(s.columns, SelectColumns::Count),
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn parses_select_with_where_text_literal() {
        let stmt = parse("select name, color from fruits where color = 'Dark Green'").unwrap();
        match stmt {
            Statement::Select(s) => {
                assert_eq!(
                    s.columns,
                    SelectColumns::Named(vec!["name".to_string(), "color".to_string()])
                );
                let filter = s.filter.unwrap();
                assert_eq!(filter.column, "color");
                assert_eq!(filter.literal, Literal::Text("Dark Green".to_string()));
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn parses_create_table_with_integer_primary_key() {
        let stmt = parse("CREATE TABLE apples (id integer primary key, name text)").unwrap();
        match stmt {
            Statement::CreateTable(t) => {
                assert_eq!(t.name, "apples");
                assert_eq!(t.columns.len(), 2);
                assert!(t.columns[0].is_integer_primary_key());
                assert!(!t.columns[1].is_integer_primary_key());
            }
            _ => panic!("expected create table"),
        }
    }

    #[test]
    fn parses_create_index() {
        let stmt = parse("create index idx_color on fruits (color)").unwrap();
        match stmt {
            Statement::CreateIndex(i) => {
                assert_eq!(i.index_name, "idx_color");
                assert_eq!(i.table_name, "fruits");
                assert_eq!(i.column, "color");
            }
            _ => panic!("expected create index"),
        }
    }

    #[test]
    fn unterminated_literal_errors() {
        assert!(matches!(
            tokenize("select * from t where c = 'oops"),
            Err(ParseError::UnterminatedLiteral)
        ));
    }

    #[test]
    fn trailing_tokens_error() {
        assert!(matches!(
            parse("select * from t extra"),
            Err(ParseError::TrailingTokens)
        ));
    }

    #[test]
    fn parses_each_comparator() {
        let cases = [
            ("select * from t where n = 1", ComparisonOp::Eq),
            ("select * from t where n == 1", ComparisonOp::Eq),
            ("select * from t where n != 1", ComparisonOp::Ne),
            ("select * from t where n < 1", ComparisonOp::Lt),
            ("select * from t where n > 1", ComparisonOp::Gt),
            ("select * from t where n <= 1", ComparisonOp::Le),
            ("select * from t where n >= 1", ComparisonOp::Ge),
        ];
        for (sql, expected) in cases {
            match parse(sql).unwrap() {
                Statement::Select(s) => assert_eq!(s.filter.unwrap().op, expected),
                _ => panic!("expected select"),
            }
        }
    }
}
