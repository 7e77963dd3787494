pub mod stacked_box_annotator;
