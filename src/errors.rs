use std::fmt;

#[derive(Debug, Clone)]
pub enum AdTrackerError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Validation(String),
    NotFound(String),
    LockTimeout(String),
    AllocationExhausted(String),
    UniqueConflict(String),
    Serialization(String),
    DateParse(String),
}

impl AdTrackerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            AdTrackerError::DatabaseConfig(_) => "E001",
            AdTrackerError::DatabaseConnection(_) => "E002",
            AdTrackerError::DatabaseOperation(_) => "E003",
            AdTrackerError::Validation(_) => "E004",
            AdTrackerError::NotFound(_) => "E005",
            AdTrackerError::LockTimeout(_) => "E006",
            AdTrackerError::AllocationExhausted(_) => "E007",
            AdTrackerError::UniqueConflict(_) => "E008",
            AdTrackerError::Serialization(_) => "E009",
            AdTrackerError::DateParse(_) => "E010",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            AdTrackerError::DatabaseConfig(_) => "Database Configuration Error",
            AdTrackerError::DatabaseConnection(_) => "Database Connection Error",
            AdTrackerError::DatabaseOperation(_) => "Database Operation Error",
            AdTrackerError::Validation(_) => "Validation Error",
            AdTrackerError::NotFound(_) => "Resource Not Found",
            AdTrackerError::LockTimeout(_) => "Lock Timeout",
            AdTrackerError::AllocationExhausted(_) => "Allocation Exhausted",
            AdTrackerError::UniqueConflict(_) => "Unique Conflict",
            AdTrackerError::Serialization(_) => "Serialization Error",
            AdTrackerError::DateParse(_) => "Date Parse Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            AdTrackerError::DatabaseConfig(msg)
            | AdTrackerError::DatabaseConnection(msg)
            | AdTrackerError::DatabaseOperation(msg)
            | AdTrackerError::Validation(msg)
            | AdTrackerError::NotFound(msg)
            | AdTrackerError::LockTimeout(msg)
            | AdTrackerError::AllocationExhausted(msg)
            | AdTrackerError::UniqueConflict(msg)
            | AdTrackerError::Serialization(msg)
            | AdTrackerError::DateParse(msg) => msg,
        }
    }
}

impl fmt::Display for AdTrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for AdTrackerError {}

// 便捷的构造函数
impl AdTrackerError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::NotFound(msg.into())
    }

    pub fn lock_timeout<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::LockTimeout(msg.into())
    }

    pub fn allocation_exhausted<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::AllocationExhausted(msg.into())
    }

    pub fn unique_conflict<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::UniqueConflict(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        AdTrackerError::DateParse(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for AdTrackerError {
    fn from(err: sea_orm::DbErr) -> Self {
        if crate::storage::backend::retry::is_unique_violation(&err) {
            AdTrackerError::UniqueConflict(err.to_string())
        } else {
            AdTrackerError::DatabaseOperation(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdTrackerError {
    fn from(err: serde_json::Error) -> Self {
        AdTrackerError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for AdTrackerError {
    fn from(err: chrono::ParseError) -> Self {
        AdTrackerError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdTrackerError>;
