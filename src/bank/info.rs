use crate::riff::FourCC;

/// Free-text and version fields of a bank's `INFO` list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BankInfo {
    pub name: String,
    /// `ifil` major and minor version.
    pub version: (u16, u16),
    pub sound_engine: String,
    pub rom_name: Option<String>,
    pub rom_version: Option<(u16, u16)>,
    pub creation_date: Option<String>,
    pub engineer: Option<String>,
    pub product: Option<String>,
    pub copyright: Option<String>,
    pub comment: Option<String>,
    pub subject: Option<String>,
    pub software: Option<String>,
}

impl Default for BankInfo {
    fn default() -> Self {
        Self {
            name: "Unnamed".into(),
            version: (2, 4),
            sound_engine: "EMU8000".into(),
            rom_name: None,
            rom_version: None,
            creation_date: None,
            engineer: None,
            product: None,
            copyright: None,
            comment: None,
            subject: None,
            software: None,
        }
    }
}

/// Optional text sub-chunks shared by SF2 and DLS `INFO` lists.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InfoField {
    CreationDate,
    Engineer,
    Product,
    Copyright,
    Comment,
    Subject,
    Software,
}

impl InfoField {
    /// Write order.
    pub const ALL: [InfoField; 7] = [
        Self::CreationDate,
        Self::Engineer,
        Self::Product,
        Self::Copyright,
        Self::Comment,
        Self::Subject,
        Self::Software,
    ];

    pub fn from_fourcc(id: &FourCC) -> Option<Self> {
        Some(match id {
            b"ICRD" => Self::CreationDate,
            b"IENG" => Self::Engineer,
            b"IPRD" => Self::Product,
            b"ICOP" => Self::Copyright,
            b"ICMT" => Self::Comment,
            b"ISBJ" => Self::Subject,
            b"ISFT" => Self::Software,
            _ => return None,
        })
    }

    pub fn fourcc(self) -> &'static FourCC {
        match self {
            Self::CreationDate => b"ICRD",
            Self::Engineer => b"IENG",
            Self::Product => b"IPRD",
            Self::Copyright => b"ICOP",
            Self::Comment => b"ICMT",
            Self::Subject => b"ISBJ",
            Self::Software => b"ISFT",
        }
    }
}

impl BankInfo {
    pub fn field(&self, field: InfoField) -> Option<&str> {
        match field {
            InfoField::CreationDate => self.creation_date.as_deref(),
            InfoField::Engineer => self.engineer.as_deref(),
            InfoField::Product => self.product.as_deref(),
            InfoField::Copyright => self.copyright.as_deref(),
            InfoField::Comment => self.comment.as_deref(),
            InfoField::Subject => self.subject.as_deref(),
            InfoField::Software => self.software.as_deref(),
        }
    }

    pub fn set_field(&mut self, field: InfoField, value: impl Into<String>) {
        let slot = match field {
            InfoField::CreationDate => &mut self.creation_date,
            InfoField::Engineer => &mut self.engineer,
            InfoField::Product => &mut self.product,
            InfoField::Copyright => &mut self.copyright,
            InfoField::Comment => &mut self.comment,
            InfoField::Subject => &mut self.subject,
            InfoField::Software => &mut self.software,
        };
        *slot = Some(value.into());
    }

    /// Set text fields in write order.
    pub fn fields(&self) -> impl Iterator<Item = (InfoField, &str)> + '_ {
        InfoField::ALL
            .into_iter()
            .filter_map(|f| self.field(f).map(|v| (f, v)))
    }
}
