pub(crate) mod feedback;
pub(crate) mod llm;
pub(crate) mod storage;
pub(crate) mod text_correction;
pub(crate) mod text_extraction;
pub(crate) mod vision_ocr;
