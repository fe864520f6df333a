pub mod domain;
pub mod ports;
pub mod stages;
pub mod validation;

pub use domain::{
    ComplexityLevel, ExportedLesson, GeneratedLesson, HealthStatus, LessonContent, LessonDetails,
    LessonRequest, SessionId, SessionSnapshot, Slide, SlideEdit, Stage, UdlPrinciple, UploadFile,
};
pub use ports::{KeyValueStore, LessonApi, PortError, PortResult};
