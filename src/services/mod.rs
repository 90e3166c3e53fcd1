pub(crate) mod exam_window;
pub(crate) mod grading;
