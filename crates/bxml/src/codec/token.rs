//! On-wire token kinds.

/// One-byte code that opens every token in the body of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenType {
    /// Element with neither attributes nor content.
    EmptyElement = 0x00,
    /// Element with attributes and no content.
    EmptyAttrElement = 0x01,
    /// Element with content and no attributes.
    ContentElement = 0x02,
    /// Element with attributes and content.
    ContentAttrElement = 0x03,
    ElementEnd = 0x10,
    AttributeStart = 0x11,
    AttributeListEnd = 0x12,
    /// Typed value content.
    CharContent = 0x13,
    /// String content given as a string-table index.
    CharContentRef = 0x14,
    Whitespace = 0x15,
    CDataSection = 0x16,
    Comment = 0x17,
    ProcessingInstruction = 0x18,
    Blob = 0x19,
    BangDoctype = 0x20,
    BangElement = 0x21,
    BangAttlist = 0x22,
    BangEntity = 0x23,
    BangNotation = 0x24,
    XmlDeclaration = 0x28,
    StringTable = 0x30,
    IndexTable = 0x31,
    Trailer = 0x32,
}

impl TokenType {
    /// Creates a TokenType from its wire representation.
    pub fn from_u8(code: u8) -> Option<TokenType> {
        match code {
            0x00 => Some(TokenType::EmptyElement),
            0x01 => Some(TokenType::EmptyAttrElement),
            0x02 => Some(TokenType::ContentElement),
            0x03 => Some(TokenType::ContentAttrElement),
            0x10 => Some(TokenType::ElementEnd),
            0x11 => Some(TokenType::AttributeStart),
            0x12 => Some(TokenType::AttributeListEnd),
            0x13 => Some(TokenType::CharContent),
            0x14 => Some(TokenType::CharContentRef),
            0x15 => Some(TokenType::Whitespace),
            0x16 => Some(TokenType::CDataSection),
            0x17 => Some(TokenType::Comment),
            0x18 => Some(TokenType::ProcessingInstruction),
            0x19 => Some(TokenType::Blob),
            0x20 => Some(TokenType::BangDoctype),
            0x21 => Some(TokenType::BangElement),
            0x22 => Some(TokenType::BangAttlist),
            0x23 => Some(TokenType::BangEntity),
            0x24 => Some(TokenType::BangNotation),
            0x28 => Some(TokenType::XmlDeclaration),
            0x30 => Some(TokenType::StringTable),
            0x31 => Some(TokenType::IndexTable),
            0x32 => Some(TokenType::Trailer),
            _ => None,
        }
    }

    /// The wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Picks the element-start variant for the given shape.
    pub fn element_start(has_attributes: bool, has_content: bool) -> TokenType {
        match (has_attributes, has_content) {
            (false, false) => TokenType::EmptyElement,
            (true, false) => TokenType::EmptyAttrElement,
            (false, true) => TokenType::ContentElement,
            (true, true) => TokenType::ContentAttrElement,
        }
    }

    /// Whether this token opens an element.
    pub fn is_element_start(self) -> bool {
        matches!(
            self,
            TokenType::EmptyElement
                | TokenType::EmptyAttrElement
                | TokenType::ContentElement
                | TokenType::ContentAttrElement
        )
    }

    /// Whether an attribute list follows this element-start token.
    pub fn has_attributes(self) -> bool {
        matches!(
            self,
            TokenType::EmptyAttrElement | TokenType::ContentAttrElement
        )
    }

    /// Whether content and an `ElementEnd` follow this element-start token.
    pub fn has_content(self) -> bool {
        matches!(
            self,
            TokenType::ContentElement | TokenType::ContentAttrElement
        )
    }

    /// Whether this is one of the `<!...>` declaration tokens.
    pub fn is_bang(self) -> bool {
        matches!(
            self,
            TokenType::BangDoctype
                | TokenType::BangElement
                | TokenType::BangAttlist
                | TokenType::BangEntity
                | TokenType::BangNotation
        )
    }

    /// Name for messages.
    pub fn name(self) -> &'static str {
        match self {
            TokenType::EmptyElement => "EmptyElement",
            TokenType::EmptyAttrElement => "EmptyAttrElement",
            TokenType::ContentElement => "ContentElement",
            TokenType::ContentAttrElement => "ContentAttrElement",
            TokenType::ElementEnd => "ElementEnd",
            TokenType::AttributeStart => "AttributeStart",
            TokenType::AttributeListEnd => "AttributeListEnd",
            TokenType::CharContent => "CharContent",
            TokenType::CharContentRef => "CharContentRef",
            TokenType::Whitespace => "Whitespace",
            TokenType::CDataSection => "CDataSection",
            TokenType::Comment => "Comment",
            TokenType::ProcessingInstruction => "ProcessingInstruction",
            TokenType::Blob => "Blob",
            TokenType::BangDoctype => "BangDoctype",
            TokenType::BangElement => "BangElement",
            TokenType::BangAttlist => "BangAttlist",
            TokenType::BangEntity => "BangEntity",
            TokenType::BangNotation => "BangNotation",
            TokenType::XmlDeclaration => "XmlDeclaration",
            TokenType::StringTable => "StringTable",
            TokenType::IndexTable => "IndexTable",
            TokenType::Trailer => "Trailer",
        }
    }
}
